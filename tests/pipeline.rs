use polars::prelude::*;
use registry_analytics::config::{AnalysisConfig, PipelineConfig};
use registry_analytics::data::columns::{numeric_values, text_values};
use registry_analytics::data::{Category, DataLoader, DataProcessor, PINCODE_COLUMN};
use registry_analytics::pipeline::{self, ANALYSIS_SUMMARY_FILE, CLEANING_REPORT_FILE};
use registry_analytics::stats::{Analyzer, GeoLevel};
use std::fs;
use std::path::Path;

const ENROLMENT_A: &str = "\
date,state,district,pincode,age_0_5,age_5_17,age_18_greater
01-01-2025,maharashtra,pune,411001,1,2,3
15-01-2025,Maharashtra,Pune,411001,2,2,2
03-02-2025,KARNATAKA,bangalore urban,560001,5,0,0
31-02-2024,Goa,North Goa,403601,1,1,1
10-02-2025,Goa,North Goa,1234,1,1,1
";

const ENROLMENT_B: &str = "\
date,state,district,pincode,age_0_5,age_5_17,age_18_greater
20-03-2025,Goa,North Goa,403601,0,0,0
21-03-2025,Goa,North Goa,403601,4,4,4
";

const DEMOGRAPHIC: &str = "\
date,state,district,pincode,demo_age_5_17,demo_age_17_
01-01-2025,Maharashtra,Pune,411001,3,3
05-02-2025,Goa,North Goa,403601,1,2
";

const BIOMETRIC: &str = "\
date,state,district,pincode,bio_age_5_17,bio_age_17_
01-01-2025,Karnataka,Bangalore Urban,560001,2,3
";

fn write(dir: &Path, category: Category, name: &str, body: &str) {
    let dir = dir.join(category.spec().source_dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), Category::Enrolment, "part_a.csv", ENROLMENT_A);
    write(tmp.path(), Category::Enrolment, "part_b.csv", ENROLMENT_B);
    write(tmp.path(), Category::Demographic, "demo.csv", DEMOGRAPHIC);
    write(tmp.path(), Category::Biometric, "bio.csv", BIOMETRIC);
    tmp
}

fn cleaned(dir: &Path, category: Category) -> DataFrame {
    let loader = DataLoader::new(dir).unwrap();
    let raw = loader.load_category(category).unwrap();
    DataProcessor::clean(&raw, category).unwrap().0
}

#[test]
fn cleaning_attributes_every_dropped_row() {
    let tmp = fixture();
    let loader = DataLoader::new(tmp.path()).unwrap();
    let raw = loader.load_category(Category::Enrolment).unwrap();
    assert_eq!(raw.height(), 7);

    let (df, stats) = DataProcessor::clean(&raw, Category::Enrolment).unwrap();
    assert_eq!(stats.initial_rows, 7);
    assert_eq!(stats.final_rows, 4);
    assert_eq!(stats.rows_removed, 3);
    assert_eq!(stats.invalid_dates, 1);
    assert_eq!(stats.invalid_pincodes, 1);
    assert_eq!(stats.zero_totals, 1);
    assert_eq!(df.height(), 4);
}

#[test]
fn cleaned_rows_have_six_digit_pincodes_and_exact_totals() {
    let tmp = fixture();
    for category in Category::ALL {
        let df = cleaned(tmp.path(), category);
        let spec = category.spec();

        for code in text_values(&df, PINCODE_COLUMN).unwrap() {
            let code = code.unwrap();
            assert_eq!(code.len(), 6, "{} pincode {}", category, code);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }

        let parts: Vec<Vec<Option<f64>>> = spec
            .count_fields
            .iter()
            .map(|f| numeric_values(&df, f).unwrap())
            .collect();
        let totals = numeric_values(&df, spec.total_field).unwrap();
        for (row, total) in totals.iter().enumerate() {
            let expected: f64 = parts.iter().map(|p| p[row].unwrap()).sum();
            assert_eq!(total.unwrap(), expected);
        }
    }
}

#[test]
fn geography_names_are_title_cased() {
    let tmp = fixture();
    let df = cleaned(tmp.path(), Category::Enrolment);
    let states: Vec<String> = text_values(&df, "state")
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert!(states.contains(&"Karnataka".to_string()));
    assert!(states.iter().all(|s| s != "maharashtra" && s != "KARNATAKA"));

    let districts: Vec<String> = text_values(&df, "district")
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert!(districts.contains(&"Bangalore Urban".to_string()));
}

#[test]
fn top_n_leads_with_the_largest_group() {
    let tmp = fixture();
    let df = cleaned(tmp.path(), Category::Enrolment);
    let analyzer = Analyzer::default();

    let by_district = analyzer
        .geographical_aggregation(&df, GeoLevel::District, "total_enrolments")
        .unwrap();
    let max_sum = numeric_values(&by_district, "total_enrolments_sum")
        .unwrap()
        .into_iter()
        .flatten()
        .fold(f64::NEG_INFINITY, f64::max);

    let top = analyzer.top_n(&df, "district", "total_enrolments", 2).unwrap();
    assert_eq!(top.height(), 2);
    let totals: Vec<f64> = numeric_values(&top, "total_total_enrolments")
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(totals[0], max_sum);
    assert!(totals.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn update_ratio_against_enrolments() {
    let tmp = fixture();
    let enrolments = cleaned(tmp.path(), Category::Enrolment);
    let updates = cleaned(tmp.path(), Category::Demographic);

    let ratios = Analyzer::default()
        .update_ratio(&enrolments, &updates, GeoLevel::State)
        .unwrap();
    let states: Vec<String> = text_values(&ratios, "state")
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    let values = numeric_values(&ratios, "update_ratio").unwrap();

    // Maharashtra 6 / 12, Goa 3 / 12, Karnataka 0 / 5
    assert_eq!(states, vec!["Maharashtra", "Goa", "Karnataka"]);
    assert_eq!(values, vec![Some(50.0), Some(25.0), Some(0.0)]);
}

#[test]
fn full_run_writes_both_reports() {
    let tmp = fixture();
    let out = tmp.path().join("outputs");
    let config = PipelineConfig {
        data_dir: tmp.path().to_path_buf(),
        output_dir: out.clone(),
        analysis: AnalysisConfig {
            top_n: 3,
            ..Default::default()
        },
        ..Default::default()
    };

    let summary = pipeline::run(&config).unwrap();

    assert_eq!(summary.cleaning.len(), 3);
    assert_eq!(
        summary.cleaning.get(Category::Enrolment).unwrap().rows_removed,
        3
    );
    assert_eq!(summary.univariate[&Category::Enrolment].count, 4);

    let months: Vec<&str> = summary.monthly_trend.iter().map(|p| p.month.as_str()).collect();
    assert_eq!(months, vec!["2025-01", "2025-02", "2025-03"]);
    assert_eq!(summary.monthly_trend[0].growth_pct, None);
    let feb = summary.monthly_trend[1].growth_pct.unwrap();
    assert!((feb + 58.333).abs() < 1e-3);
    assert!((summary.monthly_trend[2].growth_pct.unwrap() - 140.0).abs() < 1e-9);

    assert_eq!(summary.top_states.len(), 3);
    assert_eq!(summary.top_states[0].total, 12.0);
    assert!(summary.state_gini.unwrap() > 0.0);
    assert_eq!(summary.update_ratios[&Category::Biometric].len(), 3);

    let cleaning: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(CLEANING_REPORT_FILE)).unwrap())
            .unwrap();
    assert_eq!(cleaning["enrolment"]["invalid_dates"], 1);
    assert_eq!(cleaning["demographic"]["rows_removed"], 0);

    let analysis: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(ANALYSIS_SUMMARY_FILE)).unwrap())
            .unwrap();
    // row means: Jan 6, Feb 5, Mar 12
    assert_eq!(analysis["seasonality"]["peak_month"], 3);
    assert!(analysis["update_ratios"]["demographic"].is_array());
}

#[test]
fn missing_category_directory_aborts_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), Category::Enrolment, "part_a.csv", ENROLMENT_A);
    let config = PipelineConfig {
        data_dir: tmp.path().to_path_buf(),
        output_dir: tmp.path().join("outputs"),
        ..Default::default()
    };
    assert!(pipeline::run(&config).is_err());
}
