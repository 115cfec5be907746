//! Record categories and their column layout.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the date column shared by every category.
pub const DATE_COLUMN: &str = "date";
/// Free-text geography columns that get trimmed and title-cased.
pub const GEO_TEXT_COLUMNS: [&str; 2] = ["state", "district"];
/// Postal code column.
pub const PINCODE_COLUMN: &str = "pincode";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown category '{0}' (expected enrolment, demographic or biometric)")]
pub struct UnknownCategory(pub String);

/// The three kinds of source event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Enrolment,
    Demographic,
    Biometric,
}

/// Column layout of one category.
#[derive(Debug, Clone, Copy)]
pub struct CategorySpec {
    pub source_dir: &'static str,
    pub count_fields: &'static [&'static str],
    pub total_field: &'static str,
}

const ENROLMENT_SPEC: CategorySpec = CategorySpec {
    source_dir: "api_data_aadhar_enrolment",
    count_fields: &["age_0_5", "age_5_17", "age_18_greater"],
    total_field: "total_enrolments",
};

const DEMOGRAPHIC_SPEC: CategorySpec = CategorySpec {
    source_dir: "api_data_aadhar_demographic",
    count_fields: &["demo_age_5_17", "demo_age_17_"],
    total_field: "total_demo_updates",
};

const BIOMETRIC_SPEC: CategorySpec = CategorySpec {
    source_dir: "api_data_aadhar_biometric",
    count_fields: &["bio_age_5_17", "bio_age_17_"],
    total_field: "total_bio_updates",
};

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Enrolment,
        Category::Demographic,
        Category::Biometric,
    ];

    pub fn spec(self) -> &'static CategorySpec {
        match self {
            Category::Enrolment => &ENROLMENT_SPEC,
            Category::Demographic => &DEMOGRAPHIC_SPEC,
            Category::Biometric => &BIOMETRIC_SPEC,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Enrolment => "enrolment",
            Category::Demographic => "demographic",
            Category::Biometric => "biometric",
        }
    }

    /// Total fields of the update categories, in lookup order.
    pub fn update_total_fields() -> [&'static str; 2] {
        [DEMOGRAPHIC_SPEC.total_field, BIOMETRIC_SPEC.total_field]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enrolment" | "enrollment" => Ok(Category::Enrolment),
            "demographic" => Ok(Category::Demographic),
            "biometric" => Ok(Category::Biometric),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("Enrolment".parse::<Category>(), Ok(Category::Enrolment));
        assert_eq!(" biometric ".parse::<Category>(), Ok(Category::Biometric));
        assert!("payments".parse::<Category>().is_err());
    }

    #[test]
    fn update_totals_follow_specs() {
        assert_eq!(
            Category::update_total_fields(),
            ["total_demo_updates", "total_bio_updates"]
        );
        assert_eq!(Category::Enrolment.spec().count_fields.len(), 3);
    }
}
