//! Data Processor Module
//! Cleans raw category tables: date parsing, text normalization, pincode
//! validation, count coercion, derived totals and temporal features.

use crate::config::AnalysisConfig;
use crate::data::columns::{
    date_column, date_values, has_column, is_numeric_dtype, numeric_values, present_numbers,
    text_values,
};
use crate::data::{Category, CleaningStats, DATE_COLUMN, GEO_TEXT_COLUMNS, PINCODE_COLUMN};
use crate::stats::StatsCalculator;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Required length of a postal code.
pub const PINCODE_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Required column '{column}' is missing from the {category} table")]
    MissingColumn { category: Category, column: String },
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
    #[error("Invalid outlier method '{0}' (expected iqr or zscore)")]
    InvalidOutlierMethod(String),
}

/// Outlier detection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierMethod {
    /// Outside `[Q1 - k*IQR, Q3 + k*IQR]`
    Iqr,
    /// `|x - mean| / std > k`
    ZScore,
}

impl OutlierMethod {
    /// Configured multiplier for this rule.
    pub fn default_threshold(self, config: &AnalysisConfig) -> f64 {
        match self {
            OutlierMethod::Iqr => config.outlier_iqr_multiplier,
            OutlierMethod::ZScore => config.outlier_zscore_threshold,
        }
    }
}

impl FromStr for OutlierMethod {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z-score" => Ok(OutlierMethod::ZScore),
            other => Err(ProcessorError::InvalidOutlierMethod(other.to_string())),
        }
    }
}

/// Python-style title case: the first letter of every alphabetic run is
/// upper-cased, every other letter lower-cased.
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Validate a postal code. Codes that came from a numeric column lost their
/// leading zeros and are padded first; text codes are taken as written.
pub fn normalize_pincode(raw: &str, numeric_source: bool) -> Option<String> {
    let trimmed = raw.trim();
    let code = if numeric_source && trimmed.len() < PINCODE_LEN {
        format!("{:0>width$}", trimmed, width = PINCODE_LEN)
    } else {
        trimmed.to_string()
    };

    (code.len() == PINCODE_LEN && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
}

/// Missing, non-finite and negative counts become 0.
fn clamp_count(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Handles cleaning of the raw category tables.
pub struct DataProcessor;

impl DataProcessor {
    /// Clean one raw category table.
    ///
    /// Rows are dropped for a missing/invalid date, an invalid pincode, or a
    /// zero total, in that order; each drop is attributed to the first rule it
    /// fails. Fails only when the date column or a count column is absent.
    pub fn clean(
        df: &DataFrame,
        category: Category,
    ) -> Result<(DataFrame, CleaningStats), ProcessorError> {
        info!("Cleaning {} data...", category);
        let spec = category.spec();

        for column in std::iter::once(&DATE_COLUMN).chain(spec.count_fields.iter()) {
            if !has_column(df, column) {
                return Err(ProcessorError::MissingColumn {
                    category,
                    column: column.to_string(),
                });
            }
        }

        let initial_rows = df.height();
        let dates = date_values(df, DATE_COLUMN)?;
        let pincodes = if has_column(df, PINCODE_COLUMN) {
            let numeric_source = is_numeric_dtype(df.column(PINCODE_COLUMN)?.dtype());
            Some((text_values(df, PINCODE_COLUMN)?, numeric_source))
        } else {
            None
        };
        let counts: Vec<Vec<Option<f64>>> = spec
            .count_fields
            .iter()
            .map(|field| numeric_values(df, field))
            .collect::<PolarsResult<_>>()?;

        let mut stats = CleaningStats {
            initial_rows,
            ..Default::default()
        };
        let mut keep = Vec::with_capacity(initial_rows);
        let mut kept_dates: Vec<Option<NaiveDate>> = Vec::new();
        let mut kept_pincodes: Vec<String> = Vec::new();
        let mut kept_counts: Vec<Vec<f64>> = vec![Vec::new(); spec.count_fields.len()];
        let mut kept_totals: Vec<f64> = Vec::new();

        for row in 0..initial_rows {
            let Some(date) = dates[row] else {
                stats.invalid_dates += 1;
                keep.push(false);
                continue;
            };

            let pincode = match &pincodes {
                Some((codes, numeric_source)) => {
                    match codes[row]
                        .as_deref()
                        .and_then(|raw| normalize_pincode(raw, *numeric_source))
                    {
                        Some(code) => Some(code),
                        None => {
                            stats.invalid_pincodes += 1;
                            keep.push(false);
                            continue;
                        }
                    }
                }
                None => None,
            };

            let row_counts: Vec<f64> = counts.iter().map(|c| clamp_count(c[row])).collect();
            let total: f64 = row_counts.iter().sum();
            if total == 0.0 {
                stats.zero_totals += 1;
                keep.push(false);
                continue;
            }

            keep.push(true);
            kept_dates.push(Some(date));
            if let Some(code) = pincode {
                kept_pincodes.push(code);
            }
            for (dst, value) in kept_counts.iter_mut().zip(row_counts) {
                dst.push(value);
            }
            kept_totals.push(total);
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let mut cleaned = df.filter(&mask)?;

        cleaned.with_column(date_column(DATE_COLUMN, &kept_dates)?)?;
        if pincodes.is_some() {
            cleaned.with_column(Column::new(PINCODE_COLUMN.into(), kept_pincodes))?;
        }
        for column in GEO_TEXT_COLUMNS {
            if has_column(&cleaned, column) {
                let normalized: Vec<Option<String>> = text_values(&cleaned, column)?
                    .into_iter()
                    .map(|v| v.map(|s| title_case(&s)))
                    .collect();
                cleaned.with_column(Column::new(column.into(), normalized))?;
            }
        }
        for (field, values) in spec.count_fields.iter().zip(kept_counts) {
            cleaned.with_column(Column::new((*field).into(), values))?;
        }
        cleaned.with_column(Column::new(spec.total_field.into(), kept_totals))?;
        Self::add_temporal_features(&mut cleaned, &kept_dates)?;

        stats.final_rows = cleaned.height();
        stats.rows_removed = initial_rows - stats.final_rows;
        debug!(
            "{} drops: {} invalid dates, {} invalid pincodes, {} zero totals",
            category, stats.invalid_dates, stats.invalid_pincodes, stats.zero_totals
        );
        info!(
            "{} data cleaned: {} -> {} rows",
            category, initial_rows, stats.final_rows
        );

        Ok((cleaned, stats))
    }

    /// Append year, month, day_of_week (Monday = 0) and ISO week_of_year.
    fn add_temporal_features(
        df: &mut DataFrame,
        dates: &[Option<NaiveDate>],
    ) -> Result<(), ProcessorError> {
        let year: Vec<Option<i32>> = dates.iter().map(|d| d.map(|d| d.year())).collect();
        let month: Vec<Option<i32>> = dates.iter().map(|d| d.map(|d| d.month() as i32)).collect();
        let day_of_week: Vec<Option<i32>> = dates
            .iter()
            .map(|d| d.map(|d| d.weekday().num_days_from_monday() as i32))
            .collect();
        let week_of_year: Vec<Option<i32>> = dates
            .iter()
            .map(|d| d.map(|d| d.iso_week().week() as i32))
            .collect();

        df.with_column(Column::new("year".into(), year))?;
        df.with_column(Column::new("month".into(), month))?;
        df.with_column(Column::new("day_of_week".into(), day_of_week))?;
        df.with_column(Column::new("week_of_year".into(), week_of_year))?;
        Ok(())
    }

    /// Flag outlying values of `field`. Missing values are never outliers.
    pub fn detect_outliers(
        df: &DataFrame,
        field: &str,
        method: OutlierMethod,
        threshold: f64,
    ) -> Result<Vec<bool>, ProcessorError> {
        if !has_column(df, field) {
            return Err(ProcessorError::UnknownColumn(field.to_string()));
        }
        let values = numeric_values(df, field)?;
        let present = present_numbers(df, field)?;

        let flags = match method {
            OutlierMethod::Iqr => {
                let mut sorted = present;
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let q1 = StatsCalculator::percentile(&sorted, 25.0);
                let q3 = StatsCalculator::percentile(&sorted, 75.0);
                let iqr = q3 - q1;
                let (lower, upper) = (q1 - threshold * iqr, q3 + threshold * iqr);
                values
                    .iter()
                    .map(|v| v.is_some_and(|x| x < lower || x > upper))
                    .collect()
            }
            OutlierMethod::ZScore => {
                let mean = StatsCalculator::mean(&present);
                let std = StatsCalculator::sample_std(&present);
                values
                    .iter()
                    .map(|v| v.is_some_and(|x| ((x - mean) / std).abs() > threshold))
                    .collect()
            }
        };
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_enrolment(rows: &[(&str, &str, &str, &str, &str, &str, &str)]) -> DataFrame {
        let col = |i: usize| -> Vec<&str> {
            rows.iter()
                .map(|r| match i {
                    0 => r.0,
                    1 => r.1,
                    2 => r.2,
                    3 => r.3,
                    4 => r.4,
                    5 => r.5,
                    _ => r.6,
                })
                .collect()
        };
        DataFrame::new(vec![
            Column::new("date".into(), col(0)),
            Column::new("state".into(), col(1)),
            Column::new("district".into(), col(2)),
            Column::new("pincode".into(), col(3)),
            Column::new("age_0_5".into(), col(4)),
            Column::new("age_5_17".into(), col(5)),
            Column::new("age_18_greater".into(), col(6)),
        ])
        .unwrap()
    }

    #[test]
    fn title_case_matches_python_semantics() {
        assert_eq!(title_case("  jammu AND kashmir "), "Jammu And Kashmir");
        assert_eq!(title_case("north-east delhi"), "North-East Delhi");
        assert_eq!(title_case("24 parganas"), "24 Parganas");
    }

    #[test]
    fn pincode_padding_applies_to_numeric_sources_only() {
        assert_eq!(normalize_pincode("56001", true).as_deref(), Some("056001"));
        assert_eq!(normalize_pincode("1234", false), None);
        assert_eq!(normalize_pincode("011001", false).as_deref(), Some("011001"));
        assert_eq!(normalize_pincode(" 560001 ", false).as_deref(), Some("560001"));
        assert_eq!(normalize_pincode("5600011", true), None);
        assert_eq!(normalize_pincode("56a001", false), None);
    }

    #[test]
    fn drops_invalid_date_and_short_pincode() {
        let df = raw_enrolment(&[
            ("01-03-2025", "karnataka", "bengaluru", "560001", "1", "2", "3"),
            ("02-03-2025", "karnataka", "bengaluru", "1234", "1", "0", "0"),
            ("31-02-2024", "karnataka", "mysuru", "570001", "4", "0", "0"),
        ]);

        let (cleaned, stats) = DataProcessor::clean(&df, Category::Enrolment).unwrap();
        assert_eq!(cleaned.height(), 1);
        assert_eq!(stats.rows_removed, 2);
        assert_eq!(stats.invalid_dates, 1);
        assert_eq!(stats.invalid_pincodes, 1);
        assert_eq!(stats.zero_totals, 0);
        assert_eq!(stats.final_rows, 1);

        let state = text_values(&cleaned, "state").unwrap();
        assert_eq!(state, vec![Some("Karnataka".to_string())]);
        let total = present_numbers(&cleaned, "total_enrolments").unwrap();
        assert_eq!(total, vec![6.0]);
    }

    #[test]
    fn coerces_counts_and_drops_zero_totals() {
        let df = raw_enrolment(&[
            ("03-03-2025", "goa", "north goa", "403001", "-5", "abc", ""),
            ("04-03-2025", "goa", "north goa", "403001", "-5", "7", "2.5"),
        ]);

        let (cleaned, stats) = DataProcessor::clean(&df, Category::Enrolment).unwrap();
        assert_eq!(stats.zero_totals, 1);
        assert_eq!(cleaned.height(), 1);

        let spec = Category::Enrolment.spec();
        let parts: Vec<Vec<f64>> = spec
            .count_fields
            .iter()
            .map(|f| present_numbers(&cleaned, f).unwrap())
            .collect();
        assert_eq!(parts, vec![vec![0.0], vec![7.0], vec![2.5]]);
        let total = present_numbers(&cleaned, spec.total_field).unwrap();
        assert_eq!(total[0], parts.iter().map(|p| p[0]).sum::<f64>());
    }

    #[test]
    fn derives_temporal_features() {
        // 2025-03-03 is a Monday in ISO week 10
        let df = raw_enrolment(&[("03-03-2025", "goa", "x", "403001", "1", "0", "0")]);
        let (cleaned, _) = DataProcessor::clean(&df, Category::Enrolment).unwrap();

        let get = |name: &str| present_numbers(&cleaned, name).unwrap()[0];
        assert_eq!(get("year"), 2025.0);
        assert_eq!(get("month"), 3.0);
        assert_eq!(get("day_of_week"), 0.0);
        assert_eq!(get("week_of_year"), 10.0);
        assert_eq!(cleaned.column("date").unwrap().dtype(), &DataType::Date);
    }

    #[test]
    fn missing_count_column_is_an_error() {
        let df = DataFrame::new(vec![
            Column::new("date".into(), vec!["01-03-2025"]),
            Column::new("bio_age_5_17".into(), vec!["1"]),
        ])
        .unwrap();

        let err = DataProcessor::clean(&df, Category::Biometric).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::MissingColumn { ref column, .. } if column == "bio_age_17_"
        ));
    }

    #[test]
    fn numeric_pincode_column_is_zero_padded() {
        let df = DataFrame::new(vec![
            Column::new("date".into(), vec!["01-03-2025"]),
            Column::new("pincode".into(), vec![11001i64]),
            Column::new("demo_age_5_17".into(), vec![3.0]),
            Column::new("demo_age_17_".into(), vec![1.0]),
        ])
        .unwrap();

        let (cleaned, stats) = DataProcessor::clean(&df, Category::Demographic).unwrap();
        assert_eq!(stats.invalid_pincodes, 0);
        assert_eq!(
            text_values(&cleaned, "pincode").unwrap(),
            vec![Some("011001".to_string())]
        );
    }

    #[test]
    fn flags_outliers_by_both_rules() {
        let df = DataFrame::new(vec![Column::new(
            "v".into(),
            vec![Some(10.0), Some(11.0), Some(9.0), Some(10.0), Some(500.0), None],
        )])
        .unwrap();

        let iqr = DataProcessor::detect_outliers(&df, "v", OutlierMethod::Iqr, 3.0).unwrap();
        assert_eq!(iqr, vec![false, false, false, false, true, false]);

        let z = DataProcessor::detect_outliers(&df, "v", OutlierMethod::ZScore, 1.5).unwrap();
        assert_eq!(z, vec![false, false, false, false, true, false]);

        assert!("mad".parse::<OutlierMethod>().is_err());
    }
}
