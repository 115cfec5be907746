//! Table-level analysis operations.
//!
//! Every operation borrows its input frames and returns fresh results; the
//! only state an [`Analyzer`] holds is its threshold configuration.

use crate::config::AnalysisConfig;
use crate::data::columns::{has_column, numeric_values, present_numbers, text_values};
use crate::stats::{StatsCalculator, UnivariateStats};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("Column '{0}' has no non-missing values")]
    EmptyInput(String),
    #[error("Need at least {needed} paired values, found {found}")]
    InsufficientData { needed: usize, found: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Correlation between two numeric fields.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BivariateStats {
    pub n: usize,
    pub pearson_correlation: f64,
    pub pearson_p_value: f64,
    pub spearman_correlation: f64,
    pub spearman_p_value: f64,
    pub significant: bool,
}

/// Chi-square test of independence between two categorical fields.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    pub significant: bool,
}

/// Runs statistical analyses over cleaned or aggregated tables.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub(crate) fn require(df: &DataFrame, field: &str) -> Result<(), StatsError> {
        if has_column(df, field) {
            Ok(())
        } else {
            Err(StatsError::MissingColumn(field.to_string()))
        }
    }

    /// Descriptive statistics over the non-missing values of `field`.
    pub fn univariate_analysis(
        &self,
        df: &DataFrame,
        field: &str,
    ) -> Result<UnivariateStats, StatsError> {
        info!("Performing univariate analysis on {}", field);
        Self::require(df, field)?;

        let values = present_numbers(df, field)?;
        if values.is_empty() {
            return Err(StatsError::EmptyInput(field.to_string()));
        }
        Ok(StatsCalculator::compute_descriptive_stats(&values))
    }

    /// Pearson and Spearman correlation over rows where both fields are present.
    pub fn bivariate_analysis(
        &self,
        df: &DataFrame,
        field_a: &str,
        field_b: &str,
    ) -> Result<BivariateStats, StatsError> {
        info!("Performing bivariate analysis: {} vs {}", field_a, field_b);
        Self::require(df, field_a)?;
        Self::require(df, field_b)?;

        let (xs, ys): (Vec<f64>, Vec<f64>) = numeric_values(df, field_a)?
            .into_iter()
            .zip(numeric_values(df, field_b)?)
            .filter_map(|(a, b)| Some((a?, b?)))
            .unzip();

        if xs.len() < 2 {
            return Err(StatsError::InsufficientData {
                needed: 2,
                found: xs.len(),
            });
        }

        let pearson = StatsCalculator::pearson(&xs, &ys);
        let spearman = StatsCalculator::spearman(&xs, &ys);

        Ok(BivariateStats {
            n: xs.len(),
            pearson_correlation: pearson.coefficient,
            pearson_p_value: pearson.p_value,
            spearman_correlation: spearman.coefficient,
            spearman_p_value: spearman.p_value,
            significant: pearson.p_value < self.config.significance_level,
        })
    }

    /// Chi-square test of independence over the cross-tabulation of two fields.
    pub fn chi_square_independence(
        &self,
        df: &DataFrame,
        field_a: &str,
        field_b: &str,
    ) -> Result<ChiSquareResult, StatsError> {
        info!("Chi-square independence: {} x {}", field_a, field_b);
        Self::require(df, field_a)?;
        Self::require(df, field_b)?;

        let mut cells: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut rows: BTreeMap<String, usize> = BTreeMap::new();
        let mut cols: BTreeMap<String, usize> = BTreeMap::new();
        for (a, b) in text_values(df, field_a)?
            .into_iter()
            .zip(text_values(df, field_b)?)
        {
            if let (Some(a), Some(b)) = (a, b) {
                rows.entry(a.clone()).or_insert(0);
                cols.entry(b.clone()).or_insert(0);
                *cells.entry((a, b)).or_insert(0.0) += 1.0;
            }
        }

        if cells.is_empty() {
            return Err(StatsError::EmptyInput(format!("{} x {}", field_a, field_b)));
        }

        for (i, idx) in rows.values_mut().enumerate() {
            *idx = i;
        }
        for (i, idx) in cols.values_mut().enumerate() {
            *idx = i;
        }
        let mut observed = vec![vec![0.0; cols.len()]; rows.len()];
        for ((a, b), count) in &cells {
            observed[rows[a]][cols[b]] = *count;
        }
        debug!("Contingency table {}x{}", rows.len(), cols.len());

        let chi = StatsCalculator::chi_square(&observed);
        Ok(ChiSquareResult {
            statistic: chi.statistic,
            p_value: chi.p_value,
            degrees_of_freedom: chi.degrees_of_freedom,
            significant: chi.p_value < self.config.significance_level,
        })
    }

    /// Gini coefficient of `field`; `Ok(None)` when it is undefined
    /// (no values, or all values zero).
    pub fn gini_coefficient(&self, df: &DataFrame, field: &str) -> Result<Option<f64>, StatsError> {
        Self::require(df, field)?;
        let values = present_numbers(df, field)?;
        Ok(StatsCalculator::gini(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn univariate_requires_values() {
        let df = DataFrame::new(vec![Column::new(
            "v".into(),
            vec![None::<f64>, None],
        )])
        .unwrap();
        let analyzer = Analyzer::default();

        assert!(matches!(
            analyzer.univariate_analysis(&df, "v"),
            Err(StatsError::EmptyInput(_))
        ));
        assert!(matches!(
            analyzer.univariate_analysis(&df, "w"),
            Err(StatsError::MissingColumn(_))
        ));
    }

    #[test]
    fn bivariate_uses_paired_rows_only() {
        let df = DataFrame::new(vec![
            Column::new("a".into(), vec![Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)]),
            Column::new("b".into(), vec![Some(2.0), Some(4.0), Some(100.0), Some(6.0), Some(8.0)]),
        ])
        .unwrap();

        let stats = Analyzer::default().bivariate_analysis(&df, "a", "b").unwrap();
        assert_eq!(stats.n, 4);
        assert!((stats.pearson_correlation - 1.0).abs() < 1e-12);
        assert!((stats.spearman_correlation - 1.0).abs() < 1e-12);
        assert!(stats.significant);
    }

    #[test]
    fn chi_square_over_categories() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let cells = [
            ("north", "urban", 10),
            ("north", "rural", 20),
            ("south", "urban", 20),
            ("south", "rural", 10),
        ];
        for (x, y, n) in cells {
            for _ in 0..n {
                a.push(x);
                b.push(y);
            }
        }
        let df = DataFrame::new(vec![
            Column::new("region".into(), a),
            Column::new("area".into(), b),
        ])
        .unwrap();

        let result = Analyzer::default()
            .chi_square_independence(&df, "region", "area")
            .unwrap();
        assert_eq!(result.degrees_of_freedom, 1);
        assert!((result.statistic - 5.4).abs() < 1e-9);
        assert!(result.significant);
    }

    #[test]
    fn gini_over_group_totals() {
        let uniform = DataFrame::new(vec![Column::new("total".into(), vec![100.0; 10])]).unwrap();
        let mut skewed_values = vec![0.0; 9];
        skewed_values.push(1000.0);
        let skewed = DataFrame::new(vec![Column::new("total".into(), skewed_values)]).unwrap();
        let zeros = DataFrame::new(vec![Column::new("total".into(), vec![0.0; 3])]).unwrap();

        let analyzer = Analyzer::default();
        assert!(analyzer.gini_coefficient(&uniform, "total").unwrap().unwrap().abs() < 1e-12);
        let g = analyzer.gini_coefficient(&skewed, "total").unwrap().unwrap();
        assert!((g - 0.9).abs() < 1e-12);
        assert_eq!(analyzer.gini_coefficient(&zeros, "total").unwrap(), None);
    }
}
