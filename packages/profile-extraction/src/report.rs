//! URL input loading and tabular result output.
//!
//! Output is two CSV tables in the output directory: one row per extracted
//! profile, and a sibling `<base>_errors.<ext>` table with one row per URL
//! that produced no profile.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ExtractionError, Result};
use crate::types::state::PipelineState;
use crate::types::verdict::VERDICT_FIELDS;

const PROFILE_COLUMNS: [&str; 14] = [
    "source_url",
    "first_name",
    "middle_name",
    "last_name",
    "title",
    "office",
    "phone",
    "email",
    "college_unit",
    "department_division",
    "degrees",
    "research_focus_areas",
    "photo_url",
    "correlation_id",
];

const ERROR_COLUMNS: [&str; 4] = ["url", "error", "error_detail", "correlation_id"];

/// Load the URL list: a JSON array of strings.
pub fn load_urls(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    if !path.exists() {
        return Err(ExtractionError::InputNotFound { path: shown });
    }

    let raw = std::fs::read_to_string(path).map_err(|e| ExtractionError::io(path, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| ExtractionError::InvalidInput {
            path: shown.clone(),
            reason: format!("invalid JSON: {e}"),
        })?;

    let serde_json::Value::Array(items) = value else {
        return Err(ExtractionError::InvalidInput {
            path: shown,
            reason: "expected a JSON array of URL strings".to_string(),
        });
    };

    let urls = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            serde_json::Value::String(url) => Ok(url),
            other => Err(ExtractionError::InvalidInput {
                path: shown.clone(),
                reason: format!("entry {index} is not a string: {other}"),
            }),
        })
        .collect::<Result<Vec<_>>>()?;

    info!(count = urls.len(), path = %shown, "loaded URLs");
    Ok(urls)
}

/// `profiles.csv` -> `profiles_errors.csv`; a name without extension gets `.csv`.
pub fn errors_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    path.with_file_name(format!("{stem}_errors.{ext}"))
}

/// Write one row per state with an extracted profile. Returns the row count.
///
/// Validation statuses become extra `<field>_status` columns when any row
/// carries a verdict.
pub fn write_profiles(path: &Path, results: &[PipelineState]) -> Result<usize> {
    let with_validation = results
        .iter()
        .any(|s| s.extracted().is_some() && s.validation().is_some());

    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<String> = PROFILE_COLUMNS.iter().map(|c| c.to_string()).collect();
    if with_validation {
        header.extend(VERDICT_FIELDS.iter().map(|f| format!("{f}_status")));
        header.push("overall_comment".to_string());
    }
    writer.write_record(&header)?;

    let mut written = 0;
    for state in results {
        let Some(profile) = state.extracted() else {
            continue;
        };

        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        let mut row = vec![
            profile.source_url.clone(),
            text(&profile.first_name),
            text(&profile.middle_name),
            text(&profile.last_name),
            text(&profile.title),
            text(&profile.office),
            text(&profile.phone),
            text(&profile.email),
            text(&profile.college_unit),
            text(&profile.department_division),
            profile.degrees_line(),
            profile.research_line(),
            text(&profile.photo_url),
            state.correlation_id().to_string(),
        ];

        if with_validation {
            match state.validation() {
                Some(verdict) => {
                    row.extend(
                        verdict
                            .statuses()
                            .iter()
                            .map(|(_, status)| status.as_str().to_string()),
                    );
                    row.push(text(&verdict.overall_comment));
                }
                None => row.extend(std::iter::repeat(String::new()).take(VERDICT_FIELDS.len() + 1)),
            }
        }

        writer.write_record(&row)?;
        written += 1;
    }

    writer.flush().map_err(|e| ExtractionError::io(path, e))?;
    Ok(written)
}

/// Write one row per state without an extracted profile. Returns the row count.
pub fn write_errors(path: &Path, results: &[PipelineState]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(ERROR_COLUMNS)?;

    let mut written = 0;
    for state in results.iter().filter(|s| !s.is_success()) {
        let detail = match state.error_detail() {
            Some(detail) => serde_json::to_string(detail)?,
            None => String::new(),
        };
        writer.write_record([
            state.url(),
            state.error().unwrap_or("Unknown error"),
            detail.as_str(),
            state.correlation_id(),
        ])?;
        written += 1;
    }

    writer.flush().map_err(|e| ExtractionError::io(path, e))?;
    Ok(written)
}

/// Paths and row counts of a saved run. A table with no rows is not written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedReport {
    pub profiles_path: Option<PathBuf>,
    pub profiles_written: usize,
    pub errors_path: Option<PathBuf>,
    pub errors_written: usize,
}

/// Save both tables under `output_dir`, creating it if needed.
pub fn save_results(
    output_dir: &Path,
    filename: &str,
    results: &[PipelineState],
) -> Result<SavedReport> {
    std::fs::create_dir_all(output_dir).map_err(|e| ExtractionError::io(output_dir, e))?;

    let profiles_path = output_dir.join(filename);
    let mut report = SavedReport::default();

    if results.iter().any(PipelineState::is_success) {
        report.profiles_written = write_profiles(&profiles_path, results)?;
        info!(
            count = report.profiles_written,
            path = %profiles_path.display(),
            "saved profiles"
        );
        report.profiles_path = Some(profiles_path.clone());
    } else {
        info!("no successful profiles to save");
    }

    if results.iter().any(|s| !s.is_success()) {
        let path = errors_path(&profiles_path);
        report.errors_written = write_errors(&path, results)?;
        info!(
            count = report.errors_written,
            path = %path.display(),
            "saved error report"
        );
        report.errors_path = Some(path);
    } else {
        info!("no failed URLs to report");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepFailure;
    use crate::types::profile::{DegreeRecord, ProfileRecord};
    use crate::types::verdict::{ValidationStatus, ValidationVerdict};

    fn write_json(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("urls.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn extracted_state(url: &str) -> PipelineState {
        let mut state = PipelineState::new(url, "t-ok");
        state.set_clean_content("Dr. Ann Lee".to_string(), None);
        let mut profile = ProfileRecord::new(url);
        profile.first_name = Some("Ann".to_string());
        profile.last_name = Some("Lee".to_string());
        profile.degrees = vec![
            DegreeRecord::new("PhD")
                .with_institution("MIT")
                .with_year("2019"),
            DegreeRecord::new("BS"),
        ];
        profile.research_focus_areas = vec!["Soils".to_string(), "Hydrology".to_string()];
        state.set_extracted(profile);
        state
    }

    fn failed_state(url: &str) -> PipelineState {
        let mut state = PipelineState::new(url, "t-bad");
        state.record_failure(StepFailure::http(404, "404 Not Found"));
        state
    }

    fn read_rows(path: &Path) -> (csv::StringRecord, Vec<csv::StringRecord>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows = reader.records().map(|r| r.unwrap()).collect();
        (headers, rows)
    }

    #[test]
    fn test_load_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(dir.path(), r#"["https://a.edu/1", "https://a.edu/2"]"#);
        assert_eq!(
            load_urls(&path).unwrap(),
            vec!["https://a.edu/1", "https://a.edu/2"]
        );
    }

    #[test]
    fn test_load_urls_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_urls(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ExtractionError::InputNotFound { .. }));
    }

    #[test]
    fn test_load_urls_rejects_bad_shapes() {
        let dir = tempfile::tempdir().unwrap();
        for body in ["{not json", r#"{"urls": []}"#, r#"["https://a.edu", 7]"#] {
            let path = write_json(dir.path(), body);
            let err = load_urls(&path).unwrap_err();
            assert!(
                matches!(err, ExtractionError::InvalidInput { .. }),
                "{body}: {err}"
            );
        }
    }

    #[test]
    fn test_errors_path() {
        assert_eq!(
            errors_path(Path::new("out/profiles.csv")),
            PathBuf::from("out/profiles_errors.csv")
        );
        assert_eq!(
            errors_path(Path::new("out/profiles")),
            PathBuf::from("out/profiles_errors.csv")
        );
    }

    #[test]
    fn test_save_results_splits_tables() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        let results = vec![
            extracted_state("https://a.edu/ann"),
            failed_state("https://a.edu/gone"),
        ];

        let report = save_results(&out, "profiles.csv", &results).unwrap();
        assert_eq!(report.profiles_written, 1);
        assert_eq!(report.errors_written, 1);

        let (headers, rows) = read_rows(report.profiles_path.as_deref().unwrap());
        assert_eq!(headers.len(), PROFILE_COLUMNS.len());
        assert_eq!(&rows[0][0], "https://a.edu/ann");
        assert_eq!(&rows[0][10], "PhD, MIT, 2019; BS");
        assert_eq!(&rows[0][11], "Soils; Hydrology");

        let errors = report.errors_path.unwrap();
        assert_eq!(errors, out.join("profiles_errors.csv"));
        let (headers, rows) = read_rows(&errors);
        assert_eq!(&headers[0], "url");
        assert_eq!(&rows[0][0], "https://a.edu/gone");
        assert_eq!(&rows[0][1], "HTTP 404 fetching URL");
        assert!(rows[0][2].contains("\"status_code\":404"));
        assert_eq!(&rows[0][3], "t-bad");
    }

    #[test]
    fn test_validation_columns_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut judged = extracted_state("https://a.edu/ann");
        let verdict = ValidationVerdict {
            first_name_status: ValidationStatus::Correct,
            overall_comment: Some("looks right".to_string()),
            ..Default::default()
        };
        judged.set_validation(verdict);
        let unjudged = extracted_state("https://a.edu/bob");

        let path = dir.path().join("p.csv");
        assert_eq!(write_profiles(&path, &[judged, unjudged]).unwrap(), 2);

        let (headers, rows) = read_rows(&path);
        assert_eq!(headers.len(), PROFILE_COLUMNS.len() + VERDICT_FIELDS.len() + 1);
        let first_name_col = headers
            .iter()
            .position(|h| h == "first_name_status")
            .unwrap();
        assert_eq!(&rows[0][first_name_col], "Correct");
        assert_eq!(&rows[0][headers.len() - 1], "looks right");
        assert_eq!(&rows[1][first_name_col], "");
    }

    #[test]
    fn test_save_skips_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let report =
            save_results(dir.path(), "profiles.csv", &[failed_state("https://a.edu/x")]).unwrap();
        assert!(report.profiles_path.is_none());
        assert!(!dir.path().join("profiles.csv").exists());
        assert_eq!(report.errors_written, 1);
    }
}
