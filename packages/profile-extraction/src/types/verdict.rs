//! Judge verdicts on an extracted profile.

use serde::{Deserialize, Serialize};

/// Per-field judgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Value matches the page
    Correct,
    /// Value present but contradicts the page
    Incorrect,
    /// Page has the information but the extraction does not
    Missing,
    /// Neither page nor extraction has it
    #[default]
    #[serde(rename = "Not Applicable")]
    NotApplicable,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "Correct",
            Self::Incorrect => "Incorrect",
            Self::Missing => "Missing",
            Self::NotApplicable => "Not Applicable",
        }
    }

    /// Tolerant match used on judge output.
    ///
    /// Case-insensitive, ignores separators; `N/A`, `not_applicable` and
    /// `NotApplicable` all map to [`ValidationStatus::NotApplicable`].
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "correct" => Some(Self::Correct),
            "incorrect" => Some(Self::Incorrect),
            "missing" => Some(Self::Missing),
            "notapplicable" | "na" => Some(Self::NotApplicable),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile fields the judge rules on, in column order.
pub const VERDICT_FIELDS: [&str; 12] = [
    "photo_url",
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
];

/// One status per [`ProfileRecord`](super::profile::ProfileRecord) field
/// (excluding `source_url`) plus an optional overall comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub photo_url_status: ValidationStatus,
    pub first_name_status: ValidationStatus,
    pub middle_name_status: ValidationStatus,
    pub last_name_status: ValidationStatus,
    pub title_status: ValidationStatus,
    pub office_status: ValidationStatus,
    pub phone_status: ValidationStatus,
    pub email_status: ValidationStatus,
    pub college_unit_status: ValidationStatus,
    pub department_division_status: ValidationStatus,
    pub degrees_status: ValidationStatus,
    pub research_focus_areas_status: ValidationStatus,

    #[serde(default)]
    pub overall_comment: Option<String>,
}

impl ValidationVerdict {
    /// Status slot for a field name from [`VERDICT_FIELDS`].
    pub fn slot_mut(&mut self, field: &str) -> Option<&mut ValidationStatus> {
        let slot = match field {
            "photo_url" => &mut self.photo_url_status,
            "first_name" => &mut self.first_name_status,
            "middle_name" => &mut self.middle_name_status,
            "last_name" => &mut self.last_name_status,
            "title" => &mut self.title_status,
            "office" => &mut self.office_status,
            "phone" => &mut self.phone_status,
            "email" => &mut self.email_status,
            "college_unit" => &mut self.college_unit_status,
            "department_division" => &mut self.department_division_status,
            "degrees" => &mut self.degrees_status,
            "research_focus_areas" => &mut self.research_focus_areas_status,
            _ => return None,
        };
        Some(slot)
    }

    /// `(field, status)` pairs in [`VERDICT_FIELDS`] order.
    pub fn statuses(&self) -> [(&'static str, ValidationStatus); 12] {
        [
            ("photo_url", self.photo_url_status),
            ("first_name", self.first_name_status),
            ("middle_name", self.middle_name_status),
            ("last_name", self.last_name_status),
            ("title", self.title_status),
            ("office", self.office_status),
            ("phone", self.phone_status),
            ("email", self.email_status),
            ("college_unit", self.college_unit_status),
            ("department_division", self.department_division_status),
            ("degrees", self.degrees_status),
            ("research_focus_areas", self.research_focus_areas_status),
        ]
    }

    pub fn count(&self, status: ValidationStatus) -> usize {
        self.statuses().iter().filter(|(_, s)| *s == status).count()
    }

    /// Fraction of fields judged `Correct`.
    pub fn score(&self) -> f64 {
        self.count(ValidationStatus::Correct) as f64 / VERDICT_FIELDS.len() as f64
    }
}
