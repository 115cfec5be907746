//! Chart Data Module
//! Extracts plottable series from cleaned or aggregated tables.

use crate::data::columns::{date_to_days, date_values, has_column, numeric_values, text_values};
use crate::stats::{SeasonalityResult, StatsCalculator};
use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("Nothing to plot for '{0}'")]
    EmptyData(String),
    #[error("Invalid chart argument: {0}")]
    InvalidArgument(String),
    #[error("Failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Drawing failed: {0}")]
    Draw(String),
}

/// What to draw and from which columns.
#[derive(Debug, Clone)]
pub enum ChartSpec {
    /// Line over a date column
    TimeSeries {
        date_col: String,
        value_col: String,
        title: String,
    },
    /// One bar per row (rankings, ratios)
    Bar {
        category_col: String,
        value_col: String,
        title: String,
    },
    /// Distribution of one numeric column
    Histogram {
        value_col: String,
        bins: usize,
        title: String,
    },
    /// Pairwise Pearson correlation of numeric columns
    Heatmap { columns: Vec<String>, title: String },
    /// Several value columns side by side for each category
    GroupedBar {
        category_col: String,
        value_cols: Vec<String>,
        title: String,
    },
}

impl ChartSpec {
    pub fn title(&self) -> &str {
        match self {
            ChartSpec::TimeSeries { title, .. }
            | ChartSpec::Bar { title, .. }
            | ChartSpec::Histogram { title, .. }
            | ChartSpec::Heatmap { title, .. }
            | ChartSpec::GroupedBar { title, .. } => title,
        }
    }

    /// Axis descriptions (x, y).
    pub fn axis_labels(&self) -> (String, String) {
        match self {
            ChartSpec::TimeSeries { value_col, .. } => ("Date".to_string(), value_col.clone()),
            ChartSpec::Bar {
                category_col,
                value_col,
                ..
            } => (category_col.clone(), value_col.clone()),
            ChartSpec::Histogram { value_col, .. } => {
                (value_col.clone(), "Frequency".to_string())
            }
            ChartSpec::Heatmap { .. } => (String::new(), String::new()),
            ChartSpec::GroupedBar { category_col, .. } => {
                (category_col.clone(), "Value".to_string())
            }
        }
    }
}

/// One histogram bin: `[start, end)` and its count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Plottable values extracted from a table.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    /// (days since epoch, value), ascending by date
    Series(Vec<(f64, f64)>),
    Bars { labels: Vec<String>, values: Vec<f64> },
    Histogram(Vec<Bin>),
    /// Square correlation matrix; NaN where a pair has no defined coefficient
    Matrix {
        labels: Vec<String>,
        values: Vec<Vec<f64>>,
    },
    /// `values[series][category]`
    Groups {
        categories: Vec<String>,
        series: Vec<String>,
        values: Vec<Vec<f64>>,
    },
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn require(df: &DataFrame, name: &str) -> Result<(), ChartError> {
    if has_column(df, name) {
        Ok(())
    } else {
        Err(ChartError::MissingColumn(name.to_string()))
    }
}

impl ChartData {
    /// Extract the values `spec` needs. Rows with a missing value are skipped.
    pub fn from_table(spec: &ChartSpec, df: &DataFrame) -> Result<Self, ChartError> {
        match spec {
            ChartSpec::TimeSeries {
                date_col,
                value_col,
                ..
            } => {
                require(df, date_col)?;
                require(df, value_col)?;
                let mut points: Vec<(f64, f64)> = date_values(df, date_col)?
                    .into_iter()
                    .zip(numeric_values(df, value_col)?)
                    .filter_map(|(d, v)| Some((date_to_days(d?) as f64, v?)))
                    .collect();
                if points.is_empty() {
                    return Err(ChartError::EmptyData(value_col.clone()));
                }
                points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                Ok(ChartData::Series(points))
            }
            ChartSpec::Bar {
                category_col,
                value_col,
                ..
            } => {
                require(df, category_col)?;
                require(df, value_col)?;
                let (labels, values): (Vec<String>, Vec<f64>) = text_values(df, category_col)?
                    .into_iter()
                    .zip(numeric_values(df, value_col)?)
                    .filter_map(|(k, v)| Some((k?, v?)))
                    .unzip();
                if labels.is_empty() {
                    return Err(ChartError::EmptyData(value_col.clone()));
                }
                Ok(ChartData::Bars { labels, values })
            }
            ChartSpec::Histogram {
                value_col, bins, ..
            } => {
                require(df, value_col)?;
                let values: Vec<f64> = numeric_values(df, value_col)?
                    .into_iter()
                    .flatten()
                    .collect();
                Ok(ChartData::Histogram(Self::histogram(&values, *bins, value_col)?))
            }
            ChartSpec::Heatmap { columns, .. } => Self::correlation_matrix(df, columns),
            ChartSpec::GroupedBar {
                category_col,
                value_cols,
                ..
            } => Self::grouped(df, category_col, value_cols),
        }
    }

    /// Pearson coefficient of every column pair over rows where both are present.
    fn correlation_matrix(df: &DataFrame, columns: &[String]) -> Result<Self, ChartError> {
        if columns.len() < 2 {
            return Err(ChartError::InvalidArgument(
                "a heatmap needs at least two columns".to_string(),
            ));
        }
        let data: Vec<Vec<Option<f64>>> = columns
            .iter()
            .map(|c| {
                require(df, c)?;
                Ok(numeric_values(df, c)?)
            })
            .collect::<Result<_, ChartError>>()?;

        let n = columns.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            for j in i..n {
                let (xs, ys): (Vec<f64>, Vec<f64>) = data[i]
                    .iter()
                    .zip(&data[j])
                    .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                    .unzip();
                let r = StatsCalculator::pearson(&xs, &ys).coefficient;
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        Ok(ChartData::Matrix {
            labels: columns.to_vec(),
            values,
        })
    }

    /// Sum each value column per category, keeping first-seen category order.
    fn grouped(
        df: &DataFrame,
        category_col: &str,
        value_cols: &[String],
    ) -> Result<Self, ChartError> {
        if value_cols.is_empty() {
            return Err(ChartError::InvalidArgument(
                "a grouped bar chart needs at least one value column".to_string(),
            ));
        }
        require(df, category_col)?;
        for c in value_cols {
            require(df, c)?;
        }

        let keys = text_values(df, category_col)?;
        let mut categories: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<Option<usize>> = Vec::with_capacity(keys.len());
        for key in keys {
            rows.push(key.map(|k| {
                *index.entry(k.clone()).or_insert_with(|| {
                    categories.push(k);
                    categories.len() - 1
                })
            }));
        }
        if categories.is_empty() {
            return Err(ChartError::EmptyData(category_col.to_string()));
        }

        let mut values = Vec::with_capacity(value_cols.len());
        for c in value_cols {
            let mut sums = vec![0.0; categories.len()];
            for (row, v) in rows.iter().zip(numeric_values(df, c)?) {
                if let (Some(i), Some(v)) = (row, v) {
                    sums[*i] += v;
                }
            }
            values.push(sums);
        }
        Ok(ChartData::Groups {
            categories,
            series: value_cols.to_vec(),
            values,
        })
    }

    /// Monthly averages as bars labelled with month names.
    pub fn from_seasonality(result: &SeasonalityResult) -> Result<Self, ChartError> {
        if result.monthly_averages.is_empty() {
            return Err(ChartError::EmptyData("monthly averages".to_string()));
        }
        let (labels, values) = result
            .monthly_averages
            .iter()
            .map(|(&month, &avg)| {
                let label = MONTH_NAMES
                    .get((month as usize).wrapping_sub(1))
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| month.to_string());
                (label, avg)
            })
            .unzip();
        Ok(ChartData::Bars { labels, values })
    }

    /// Equal-width bins over `[min, max]`; the last bin is closed.
    fn histogram(values: &[f64], bins: usize, name: &str) -> Result<Vec<Bin>, ChartError> {
        if bins == 0 {
            return Err(ChartError::InvalidArgument("bins must be at least 1".to_string()));
        }
        if values.is_empty() {
            return Err(ChartError::EmptyData(name.to_string()));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

        let mut out: Vec<Bin> = (0..bins)
            .map(|i| Bin {
                start: min + i as f64 * width,
                end: min + (i + 1) as f64 * width,
                count: 0,
            })
            .collect();
        for &v in values {
            let idx = (((v - min) / width) as usize).min(bins - 1);
            out[idx].count += 1;
        }
        Ok(out)
    }

    /// Value range with 15% padding, widened when flat.
    pub fn y_range(&self) -> (f64, f64) {
        let (min, max) = match self {
            ChartData::Series(points) => points
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
                    (lo.min(y), hi.max(y))
                }),
            ChartData::Bars { values, .. } => values
                .iter()
                .fold((0.0_f64, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v))),
            ChartData::Histogram(bins) => (
                0.0,
                bins.iter().map(|b| b.count).max().unwrap_or(0) as f64,
            ),
            ChartData::Matrix { .. } => return (-1.0, 1.0),
            ChartData::Groups { values, .. } => values
                .iter()
                .flatten()
                .fold((0.0_f64, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        };
        if !min.is_finite() || !max.is_finite() {
            return (0.0, 1.0);
        }
        let pad = if max > min { (max - min) * 0.15 } else { 1.0 };
        let lower = if min >= 0.0 && !matches!(self, ChartData::Series(_)) {
            0.0
        } else {
            min - pad
        };
        (lower, max + pad)
    }
}
