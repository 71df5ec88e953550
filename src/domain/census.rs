// ============================================================
// Layer 3 — Census Row Domain Type
// ============================================================
// One row of the Census Income ("Adult") dataset.
//
// The raw files have no header row, so the column order below
// IS the schema. Every row carries:
//   - 5 numeric features        (age, education_num, ...)
//   - 8 categorical features    (workclass, education, ...)
//   - 1 instance weight column  (fnlwgt)
//   - 1 label column            (income_bracket)
//
// The label is a string in the raw data:
//   adult.data → "<=50K" / ">50K"
//   adult.test → "<=50K." / ">50K."   (note the trailing dot)
//
// Reference: UCI Machine Learning Repository — Adult dataset
//            Rust Book §5 (Structs)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// All columns in file order
pub const CSV_COLUMNS: [&str; 15] = [
    "age", "workclass", "fnlwgt", "education", "education_num",
    "marital_status", "occupation", "relationship", "race", "gender",
    "capital_gain", "capital_loss", "hours_per_week", "native_country",
    "income_bracket",
];

/// Columns fed to the model as plain numbers
pub const NUMERIC_COLUMNS: [&str; 5] = [
    "age", "education_num", "capital_gain", "capital_loss", "hours_per_week",
];

/// Columns fed to the model through a vocabulary lookup + embedding
pub const CATEGORICAL_COLUMNS: [&str; 8] = [
    "workclass", "education", "marital_status", "occupation",
    "relationship", "race", "gender", "native_country",
];

/// Per-row importance weight used by the loss and every metric
pub const WEIGHT_COLUMN: &str = "fnlwgt";

/// The prediction target
pub const LABEL_COLUMN: &str = "income_bracket";

/// The positive class string (after stripping whitespace and dots)
pub const POSITIVE_LABEL: &str = ">50K";

/// The negative class string
pub const NEGATIVE_LABEL: &str = "<=50K";

/// One raw row. Field order must match CSV_COLUMNS because the
/// csv crate deserialises header-less records by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusRow {
    pub age:            f32,
    pub workclass:      String,
    pub fnlwgt:         f32,
    pub education:      String,
    pub education_num:  f32,
    pub marital_status: String,
    pub occupation:     String,
    pub relationship:   String,
    pub race:           String,
    pub gender:         String,
    pub capital_gain:   f32,
    pub capital_loss:   f32,
    pub hours_per_week: f32,
    pub native_country: String,
    pub income_bracket: String,
}

impl CensusRow {
    /// Look up a numeric column by name
    pub fn numeric(&self, name: &str) -> Option<f32> {
        match name {
            "age"            => Some(self.age),
            WEIGHT_COLUMN    => Some(self.fnlwgt),
            "education_num"  => Some(self.education_num),
            "capital_gain"   => Some(self.capital_gain),
            "capital_loss"   => Some(self.capital_loss),
            "hours_per_week" => Some(self.hours_per_week),
            _ => None,
        }
    }

    /// Look up a categorical column by name
    pub fn categorical(&self, name: &str) -> Option<&str> {
        match name {
            "workclass"      => Some(&self.workclass),
            "education"      => Some(&self.education),
            "marital_status" => Some(&self.marital_status),
            "occupation"     => Some(&self.occupation),
            "relationship"   => Some(&self.relationship),
            "race"           => Some(&self.race),
            "gender"         => Some(&self.gender),
            "native_country" => Some(&self.native_country),
            LABEL_COLUMN     => Some(&self.income_bracket),
            _ => None,
        }
    }

    /// The binary label: 1.0 for ">50K", 0.0 for "<=50K"
    pub fn label(&self) -> Result<f32> {
        parse_label(&self.income_bracket)
    }

    /// The instance weight (fnlwgt)
    pub fn weight(&self) -> f32 {
        self.fnlwgt
    }
}

/// Convert a raw income bracket string into a 0/1 label.
///
/// The test split writes ">50K." with a trailing dot, so both
/// whitespace and dots are stripped before comparing.
pub fn parse_label(raw: &str) -> Result<f32> {
    let cleaned = raw.trim().trim_end_matches('.');
    match cleaned {
        POSITIVE_LABEL => Ok(1.0),
        NEGATIVE_LABEL => Ok(0.0),
        other => bail!("unknown {LABEL_COLUMN} '{other}'"),
    }
}

#[cfg(test)]
pub(crate) fn sample_row(age: f32, workclass: &str, label: &str) -> CensusRow {
    CensusRow {
        age,
        workclass:      workclass.to_string(),
        fnlwgt:         1.0,
        education:      "Bachelors".to_string(),
        education_num:  13.0,
        marital_status: "Never-married".to_string(),
        occupation:     "Adm-clerical".to_string(),
        relationship:   "Not-in-family".to_string(),
        race:           "White".to_string(),
        gender:         "Male".to_string(),
        capital_gain:   0.0,
        capital_loss:   0.0,
        hours_per_week: 40.0,
        native_country: "United-States".to_string(),
        income_bracket: label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_train_split() {
        assert_eq!(parse_label(">50K").unwrap(), 1.0);
        assert_eq!(parse_label(" <=50K").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_label_strips_trailing_dot() {
        // adult.test labels end with '.'
        assert_eq!(parse_label(">50K.").unwrap(), 1.0);
        assert_eq!(parse_label("<=50K. ").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_label_rejects_garbage() {
        assert!(parse_label("maybe").is_err());
        assert!(parse_label("").is_err());
    }

    #[test]
    fn test_column_lookup() {
        let row = sample_row(39.0, "State-gov", ">50K");
        assert_eq!(row.numeric("age"), Some(39.0));
        assert_eq!(row.numeric(WEIGHT_COLUMN), Some(1.0));
        assert_eq!(row.categorical(LABEL_COLUMN), Some(">50K"));
        assert_eq!(row.categorical("workclass"), Some("State-gov"));
        assert_eq!(row.numeric("workclass"), None);
        assert_eq!(row.categorical("nope"), None);
    }

    #[test]
    fn test_feature_columns_are_part_of_schema() {
        for c in NUMERIC_COLUMNS.iter().chain(CATEGORICAL_COLUMNS.iter()) {
            assert!(CSV_COLUMNS.contains(c), "{c} missing from schema");
        }
        assert!(CSV_COLUMNS.contains(&WEIGHT_COLUMN));
        assert!(CSV_COLUMNS.contains(&LABEL_COLUMN));
    }
}
