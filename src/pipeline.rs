//! Batch run: load, clean, analyze, chart and write the JSON reports.

use crate::charts::{ChartRenderer, ChartSpec};
use crate::config::PipelineConfig;
use crate::data::columns::{date_values, numeric_values, text_values};
use crate::data::{Category, CleaningReport, DataLoader, DataProcessor, OutlierMethod};
use crate::stats::{
    Analyzer, BivariateStats, GeoLevel, Granularity, SeasonalityResult, UnivariateStats,
};
use anyhow::{Context, Result};
use polars::prelude::{BooleanChunked, DataFrame, NewChunkedArray};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CLEANING_REPORT_FILE: &str = "cleaning_report.json";
pub const ANALYSIS_SUMMARY_FILE: &str = "analysis_summary.json";

const HISTOGRAM_BINS: usize = 30;

/// A geography and its summed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    pub total: f64,
}

/// One month of the enrolment trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
    pub growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioEntry {
    pub state: String,
    pub enrolments: f64,
    pub updates: f64,
    pub update_ratio: Option<f64>,
}

/// Everything one run computed; serialized as `analysis_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub cleaning: CleaningReport,
    pub univariate: BTreeMap<Category, UnivariateStats>,
    /// Correlation of the 5-17 and 18+ enrolment counts
    pub age_group_correlation: Option<BivariateStats>,
    pub enrolment_outliers: usize,
    pub monthly_trend: Vec<TrendPoint>,
    pub seasonality: Option<SeasonalityResult>,
    pub top_states: Vec<RankedEntry>,
    pub top_districts: Vec<RankedEntry>,
    pub update_ratios: BTreeMap<Category, Vec<RatioEntry>>,
    pub state_gini: Option<f64>,
    pub charts: Vec<PathBuf>,
}

fn ranked_entries(df: &DataFrame, key: &str, value: &str) -> Result<Vec<RankedEntry>> {
    Ok(text_values(df, key)?
        .into_iter()
        .zip(numeric_values(df, value)?)
        .filter_map(|(name, total)| {
            Some(RankedEntry {
                name: name?,
                total: total?,
            })
        })
        .collect())
}

fn trend_points(monthly: &DataFrame, sum_col: &str, growth_col: &str) -> Result<Vec<TrendPoint>> {
    let months = date_values(monthly, "bucket_start")?;
    let totals = numeric_values(monthly, sum_col)?;
    let growth = numeric_values(monthly, growth_col)?;
    Ok(months
        .into_iter()
        .zip(totals)
        .zip(growth)
        .filter_map(|((month, total), growth_pct)| {
            Some(TrendPoint {
                month: month?.format("%Y-%m").to_string(),
                total: total?,
                growth_pct,
            })
        })
        .collect())
}

fn ratio_entries(df: &DataFrame, limit: usize) -> Result<Vec<RatioEntry>> {
    let geo = GeoLevel::State.column();
    Ok(text_values(df, geo)?
        .into_iter()
        .zip(numeric_values(df, "enrolments")?)
        .zip(numeric_values(df, "updates")?)
        .zip(numeric_values(df, "update_ratio")?)
        .filter_map(|(((state, enrolments), updates), update_ratio)| {
            Some(RatioEntry {
                state: state?,
                enrolments: enrolments.unwrap_or(0.0),
                updates: updates.unwrap_or(0.0),
                update_ratio,
            })
        })
        .take(limit)
        .collect())
}

/// Rows of `df` whose `column` value is one of `keep`.
fn rows_matching(df: &DataFrame, column: &str, keep: &[&str]) -> Result<DataFrame> {
    let mask: Vec<bool> = text_values(df, column)?
        .iter()
        .map(|v| v.as_deref().is_some_and(|v| keep.contains(&v)))
        .collect();
    Ok(df.filter(&BooleanChunked::from_slice("keep".into(), &mask))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Chart rendering is best effort: a failed chart is logged and skipped.
fn try_render(
    renderer: &ChartRenderer,
    charts: &mut Vec<PathBuf>,
    spec: ChartSpec,
    df: &DataFrame,
    file_name: &str,
) {
    match renderer.render(&spec, df, file_name) {
        Ok(path) => charts.push(path),
        Err(e) => warn!("Skipping chart {}: {}", file_name, e),
    }
}

/// Run the whole batch described by `config`.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    info!("Starting analysis of {}", config.data_dir.display());
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;

    let loader = DataLoader::new(&config.data_dir)
        .with_context(|| format!("Cannot read data directory {}", config.data_dir.display()))?;
    let raw = loader.load_all().context("Failed to load datasets")?;
    for (category, df) in &raw {
        let summary = DataLoader::summarize(df);
        debug!(
            "{} raw table: {} rows, columns {:?}, nulls {:?}",
            category, summary.rows, summary.columns, summary.null_counts
        );
    }

    let mut report = CleaningReport::new();
    let mut cleaned: BTreeMap<Category, DataFrame> = BTreeMap::new();
    for (category, df) in &raw {
        let (clean, stats) = DataProcessor::clean(df, *category)
            .with_context(|| format!("Failed to clean {} data", category))?;
        report.record(*category, stats);
        cleaned.insert(*category, clean);
    }
    write_json(&config.output_dir.join(CLEANING_REPORT_FILE), &report)?;

    let analyzer = Analyzer::new(config.analysis.clone());
    let top_n = config.analysis.top_n;

    let mut univariate = BTreeMap::new();
    for (category, df) in &cleaned {
        match analyzer.univariate_analysis(df, category.spec().total_field) {
            Ok(stats) => {
                univariate.insert(*category, stats);
            }
            Err(e) => warn!("No univariate statistics for {}: {}", category, e),
        }
    }

    let enrolment = cleaned
        .get(&Category::Enrolment)
        .context("Enrolment data missing after cleaning")?;
    let enrol_field = Category::Enrolment.spec().total_field;

    let age_group_correlation =
        match analyzer.bivariate_analysis(enrolment, "age_5_17", "age_18_greater") {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Skipping age group correlation: {}", e);
                None
            }
        };

    let outlier_method = OutlierMethod::Iqr;
    let enrolment_outliers = DataProcessor::detect_outliers(
        enrolment,
        enrol_field,
        outlier_method,
        outlier_method.default_threshold(&config.analysis),
    )?
    .into_iter()
    .filter(|&flag| flag)
    .count();
    info!("{} enrolment outliers flagged", enrolment_outliers);

    let monthly = analyzer.temporal_aggregation(enrolment, enrol_field, Granularity::Month)?;
    let sum_col = format!("{}_sum", enrol_field);
    let monthly = analyzer.growth_rate(&monthly, &sum_col, 1)?;
    let monthly_trend = trend_points(&monthly, &sum_col, &format!("{}_growth", sum_col))?;

    let seasonality = match analyzer.detect_seasonality(enrolment, enrol_field) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!("Skipping seasonality: {}", e);
            None
        }
    };

    let by_state = analyzer.geographical_aggregation(enrolment, GeoLevel::State, enrol_field)?;
    let top_states = ranked_entries(
        &by_state.head(Some(top_n)),
        GeoLevel::State.column(),
        &sum_col,
    )?;
    let state_gini = analyzer.gini_coefficient(&by_state, &sum_col)?;

    let district = GeoLevel::District.column();
    let districts = analyzer.top_n(enrolment, district, enrol_field, top_n)?;
    let top_districts = ranked_entries(&districts, district, &format!("total_{}", enrol_field))?;

    let renderer =
        ChartRenderer::new(&config.output_dir, config.chart_width, config.chart_height)?;
    let mut charts = Vec::new();

    let mut update_ratios = BTreeMap::new();
    for category in [Category::Demographic, Category::Biometric] {
        let Some(updates) = cleaned.get(&category) else {
            continue;
        };
        let ratios = analyzer.update_ratio(enrolment, updates, GeoLevel::State)?;
        try_render(
            &renderer,
            &mut charts,
            ChartSpec::Bar {
                category_col: GeoLevel::State.column().to_string(),
                value_col: "update_ratio".to_string(),
                title: format!("{} updates per 100 enrolments", category),
            },
            &ratios.head(Some(top_n)),
            &format!("{}_update_ratio.png", category),
        );
        update_ratios.insert(category, ratio_entries(&ratios, top_n)?);
    }

    try_render(
        &renderer,
        &mut charts,
        ChartSpec::TimeSeries {
            date_col: "bucket_start".to_string(),
            value_col: sum_col.clone(),
            title: "Monthly enrolments".to_string(),
        },
        &monthly,
        "enrolment_monthly_trend.png",
    );
    try_render(
        &renderer,
        &mut charts,
        ChartSpec::Bar {
            category_col: GeoLevel::State.column().to_string(),
            value_col: sum_col.clone(),
            title: format!("Top {} states by enrolment", top_n),
        },
        &by_state.head(Some(top_n)),
        "top_states_enrolment.png",
    );
    try_render(
        &renderer,
        &mut charts,
        ChartSpec::Bar {
            category_col: district.to_string(),
            value_col: format!("total_{}", enrol_field),
            title: format!("Top {} districts by enrolment", top_n),
        },
        &districts,
        "top_districts_enrolment.png",
    );
    try_render(
        &renderer,
        &mut charts,
        ChartSpec::Histogram {
            value_col: enrol_field.to_string(),
            bins: HISTOGRAM_BINS,
            title: "Distribution of daily enrolments".to_string(),
        },
        enrolment,
        "enrolment_distribution.png",
    );
    if let Some(result) = &seasonality {
        let title = "Average enrolments by month";
        match renderer.render_seasonal(result, title, "enrolment_seasonality.png") {
            Ok(path) => charts.push(path),
            Err(e) => warn!("Skipping seasonality chart: {}", e),
        }
    }

    let age_bands: Vec<String> = Category::Enrolment
        .spec()
        .count_fields
        .iter()
        .map(|f| f.to_string())
        .collect();
    try_render(
        &renderer,
        &mut charts,
        ChartSpec::Heatmap {
            columns: age_bands.clone(),
            title: "Correlation of enrolment age bands".to_string(),
        },
        enrolment,
        "enrolment_age_correlation.png",
    );
    let leading: Vec<&str> = top_states.iter().map(|e| e.name.as_str()).collect();
    try_render(
        &renderer,
        &mut charts,
        ChartSpec::GroupedBar {
            category_col: GeoLevel::State.column().to_string(),
            value_cols: age_bands,
            title: format!("Enrolments by age band, top {} states", top_n),
        },
        &rows_matching(enrolment, GeoLevel::State.column(), &leading)?,
        "top_states_age_bands.png",
    );

    let summary = RunSummary {
        cleaning: report,
        univariate,
        age_group_correlation,
        enrolment_outliers,
        monthly_trend,
        seasonality,
        top_states,
        top_districts,
        update_ratios,
        state_gini,
        charts,
    };
    write_json(&config.output_dir.join(ANALYSIS_SUMMARY_FILE), &summary)?;
    info!("Analysis complete; {} charts written", summary.charts.len());
    Ok(summary)
}
