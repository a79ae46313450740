//! Extracted faculty profile.

use serde::{Deserialize, Deserializer, Serialize};

/// One academic degree, in the order it appears on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegreeRecord {
    /// e.g. "PhD", "M.S."
    #[serde(default)]
    pub degree_type: Option<String>,

    #[serde(default)]
    pub institution: Option<String>,

    /// Always a string; numeric years are normalized before decoding.
    #[serde(default)]
    pub year: Option<String>,
}

impl DegreeRecord {
    pub fn new(degree_type: impl Into<String>) -> Self {
        Self {
            degree_type: Some(degree_type.into()),
            ..Default::default()
        }
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = Some(institution.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Render as `"<type>, <institution>, <year>"`, skipping absent parts.
    pub fn display_line(&self) -> String {
        [&self.degree_type, &self.institution, &self.year]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Facts about one person extracted from a profile page.
///
/// Apart from `source_url` and `photo_url`, every field is either absent or
/// something the extractor claims appears in the page text. The judge checks
/// that claim; nothing here does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Always the URL the page was fetched from
    pub source_url: String,

    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub office: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub college_unit: Option<String>,
    #[serde(default)]
    pub department_division: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub degrees: Vec<DegreeRecord>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub research_focus_areas: Vec<String>,

    /// Found structurally during preprocessing when possible
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl ProfileRecord {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Default::default()
        }
    }

    /// "First Middle Last", skipping absent parts.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Degrees joined with `"; "`.
    pub fn degrees_line(&self) -> String {
        self.degrees
            .iter()
            .map(DegreeRecord::display_line)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Research areas joined with `"; "`.
    pub fn research_line(&self) -> String {
        self.research_focus_areas.join("; ")
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
