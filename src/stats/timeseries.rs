//! Period-over-period growth and monthly seasonality.

use crate::data::columns::{date_values, numeric_values};
use crate::data::DATE_COLUMN;
use crate::stats::{Analyzer, StatsCalculator, StatsError};
use chrono::Datelike;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Monthly seasonality profile of one field.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalityResult {
    /// Calendar month (1-12) to mean value, across all years
    pub monthly_averages: BTreeMap<u32, f64>,
    pub peak_month: Option<u32>,
    pub low_month: Option<u32>,
    /// `None` when fewer than two months are present or the mean is zero
    pub coefficient_of_variation: Option<f64>,
    pub has_strong_seasonality: bool,
}

impl Analyzer {
    /// Copy of `df` with `<field>_growth` = percent change against the row
    /// `period_lag` positions earlier.
    ///
    /// Rows without a defined predecessor, with a missing value on either
    /// side, or with a zero predecessor get a null growth.
    pub fn growth_rate(
        &self,
        df: &DataFrame,
        field: &str,
        period_lag: usize,
    ) -> Result<DataFrame, StatsError> {
        if period_lag == 0 {
            return Err(StatsError::InvalidArgument(
                "period_lag must be at least 1".to_string(),
            ));
        }
        Self::require(df, field)?;

        let values = numeric_values(df, field)?;
        let growth: Vec<Option<f64>> = (0..values.len())
            .map(|t| {
                let previous = values.get(t.checked_sub(period_lag)?).copied().flatten()?;
                let current = values[t]?;
                (previous != 0.0).then(|| (current - previous) / previous * 100.0)
            })
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new(format!("{}_growth", field).into(), growth))?;
        Ok(out)
    }

    /// Mean of `field` per calendar month across all years, with peak and
    /// trough months and the coefficient of variation of the monthly means.
    pub fn detect_seasonality(
        &self,
        df: &DataFrame,
        field: &str,
    ) -> Result<SeasonalityResult, StatsError> {
        info!("Detecting seasonality in {}", field);
        Self::require(df, DATE_COLUMN)?;
        Self::require(df, field)?;

        let mut months: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for (date, value) in date_values(df, DATE_COLUMN)?
            .into_iter()
            .zip(numeric_values(df, field)?)
        {
            if let (Some(date), Some(value)) = (date, value) {
                let entry = months.entry(date.month()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        if months.is_empty() {
            return Err(StatsError::EmptyInput(field.to_string()));
        }

        let monthly_averages: BTreeMap<u32, f64> = months
            .into_iter()
            .map(|(month, (sum, n))| (month, sum / n as f64))
            .collect();

        let mut peak: Option<(u32, f64)> = None;
        let mut low: Option<(u32, f64)> = None;
        for (&month, &avg) in &monthly_averages {
            if peak.map_or(true, |(_, best)| avg > best) {
                peak = Some((month, avg));
            }
            if low.map_or(true, |(_, worst)| avg < worst) {
                low = Some((month, avg));
            }
        }

        let means: Vec<f64> = monthly_averages.values().copied().collect();
        let cv = StatsCalculator::sample_std(&means) / StatsCalculator::mean(&means) * 100.0;
        let coefficient_of_variation = cv.is_finite().then_some(cv);

        Ok(SeasonalityResult {
            monthly_averages,
            peak_month: peak.map(|(m, _)| m),
            low_month: low.map(|(m, _)| m),
            coefficient_of_variation,
            has_strong_seasonality: coefficient_of_variation
                .is_some_and(|cv| cv > self.config().strong_seasonality_cv),
        })
    }
}
