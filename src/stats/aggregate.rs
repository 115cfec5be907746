//! Temporal and geographic aggregation, rankings and update ratios.

use crate::data::columns::{date_column, date_values, numeric_values, text_values};
use crate::data::{Category, DATE_COLUMN, PINCODE_COLUMN};
use crate::stats::{Analyzer, StatsError};
use chrono::{Datelike, Days, Months, NaiveDate};
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Calendar bucket size for temporal aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    /// ISO weeks, starting Monday
    Week,
    Month,
}

impl Granularity {
    /// First day of the bucket containing `date`.
    pub fn bucket_start(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => Some(date),
            Granularity::Week => date.checked_sub_days(Days::new(
                date.weekday().num_days_from_monday() as u64,
            )),
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        }
    }

    /// Start of the bucket following the one starting at `start`.
    pub fn next_bucket(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.succ_opt(),
            Granularity::Week => start.checked_add_days(Days::new(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
        }
    }
}

impl FromStr for Granularity {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(Granularity::Day),
            "w" | "week" | "weekly" => Ok(Granularity::Week),
            "m" | "month" | "monthly" => Ok(Granularity::Month),
            _ => Err(StatsError::InvalidArgument(format!(
                "unknown granularity '{}' (expected D, W or M)",
                s
            ))),
        }
    }
}

/// Geographic grouping level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoLevel {
    State,
    District,
    Pincode,
}

impl GeoLevel {
    pub fn column(self) -> &'static str {
        match self {
            GeoLevel::State => "state",
            GeoLevel::District => "district",
            GeoLevel::Pincode => PINCODE_COLUMN,
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for GeoLevel {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "state" => Ok(GeoLevel::State),
            "district" => Ok(GeoLevel::District),
            "pincode" => Ok(GeoLevel::Pincode),
            _ => Err(StatsError::InvalidArgument(format!(
                "unknown geography level '{}' (expected state, district or pincode)",
                s
            ))),
        }
    }
}

/// Running sum and count of present values for one group.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: u32,
}

impl Accumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Group `values` by text key. Rows with a missing key are skipped.
fn group_by_key(
    keys: Vec<Option<String>>,
    values: Vec<Option<f64>>,
) -> BTreeMap<String, Accumulator> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for (key, value) in keys.into_iter().zip(values) {
        if let Some(key) = key {
            groups.entry(key).or_default().push(value);
        }
    }
    groups
}

/// Stable descending sort by sum; equal sums keep key order.
fn ranked(groups: BTreeMap<String, Accumulator>) -> Vec<(String, Accumulator)> {
    let mut rows: Vec<(String, Accumulator)> = groups.into_iter().collect();
    rows.sort_by(|a, b| b.1.sum.partial_cmp(&a.1.sum).unwrap_or(Ordering::Equal));
    rows
}

/// Two decimals, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

impl Analyzer {
    /// Sum, mean and count of `field` per calendar bucket, ascending.
    ///
    /// Empty buckets between the first and last populated one are emitted
    /// with sum 0, missing mean and count 0.
    pub fn temporal_aggregation(
        &self,
        df: &DataFrame,
        field: &str,
        granularity: Granularity,
    ) -> Result<DataFrame, StatsError> {
        info!("Aggregating {} by {:?}", field, granularity);
        Self::require(df, DATE_COLUMN)?;
        Self::require(df, field)?;

        let mut buckets: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
        for (date, value) in date_values(df, DATE_COLUMN)?
            .into_iter()
            .zip(numeric_values(df, field)?)
        {
            if let Some(start) = date.and_then(|d| granularity.bucket_start(d)) {
                buckets.entry(start).or_default().push(value);
            }
        }

        if let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) {
            let mut cursor = granularity.next_bucket(first);
            while let Some(start) = cursor.filter(|s| *s < last) {
                buckets.entry(start).or_default();
                cursor = granularity.next_bucket(start);
            }
        }

        let starts: Vec<Option<NaiveDate>> = buckets.keys().map(|d| Some(*d)).collect();
        let sums: Vec<f64> = buckets.values().map(|a| a.sum).collect();
        let means: Vec<Option<f64>> = buckets.values().map(Accumulator::mean).collect();
        let counts: Vec<u32> = buckets.values().map(|a| a.count).collect();

        Ok(DataFrame::new(vec![
            date_column("bucket_start", &starts)?,
            Column::new(format!("{}_sum", field).into(), sums),
            Column::new(format!("{}_mean", field).into(), means),
            Column::new("count".into(), counts),
        ])?)
    }

    /// Sum, mean and count of `field` per geography key, descending by sum.
    pub fn geographical_aggregation(
        &self,
        df: &DataFrame,
        level: GeoLevel,
        field: &str,
    ) -> Result<DataFrame, StatsError> {
        info!("Aggregating {} by {}", field, level);
        Self::require(df, level.column())?;
        Self::require(df, field)?;

        let groups = group_by_key(text_values(df, level.column())?, numeric_values(df, field)?);
        let rows = ranked(groups);

        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        let sums: Vec<f64> = rows.iter().map(|(_, a)| a.sum).collect();
        let means: Vec<Option<f64>> = rows.iter().map(|(_, a)| a.mean()).collect();
        let counts: Vec<u32> = rows.iter().map(|(_, a)| a.count).collect();

        Ok(DataFrame::new(vec![
            Column::new(level.column().into(), keys),
            Column::new(format!("{}_sum", field).into(), sums),
            Column::new(format!("{}_mean", field).into(), means),
            Column::new("count".into(), counts),
        ])?)
    }

    /// The `n` groups with the largest summed `value_field`.
    pub fn top_n(
        &self,
        df: &DataFrame,
        group_field: &str,
        value_field: &str,
        n: usize,
    ) -> Result<DataFrame, StatsError> {
        Self::require(df, group_field)?;
        Self::require(df, value_field)?;

        let groups = group_by_key(text_values(df, group_field)?, numeric_values(df, value_field)?);
        let rows: Vec<(String, Accumulator)> = ranked(groups).into_iter().take(n).collect();

        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        let totals: Vec<f64> = rows.iter().map(|(_, a)| a.sum).collect();

        Ok(DataFrame::new(vec![
            Column::new(group_field.into(), keys),
            Column::new(format!("total_{}", value_field).into(), totals),
        ])?)
    }

    /// Updates per 100 enrolments by geography.
    ///
    /// The update field is `total_demo_updates` or, failing that,
    /// `total_bio_updates`. Geographies missing from one side count 0 there.
    /// Zero enrolments give a null ratio; null ratios sort last.
    pub fn update_ratio(
        &self,
        enrolments: &DataFrame,
        updates: &DataFrame,
        geo_level: GeoLevel,
    ) -> Result<DataFrame, StatsError> {
        info!("Calculating update ratio at {} level", geo_level);
        let enrol_field = Category::Enrolment.spec().total_field;
        let update_field = Category::update_total_fields()
            .into_iter()
            .find(|f| Self::require(updates, f).is_ok())
            .ok_or_else(|| StatsError::MissingColumn(Category::update_total_fields().join(" | ")))?;
        let geo = geo_level.column();
        Self::require(enrolments, geo)?;
        Self::require(enrolments, enrol_field)?;
        Self::require(updates, geo)?;

        let enrol_groups = group_by_key(
            text_values(enrolments, geo)?,
            numeric_values(enrolments, enrol_field)?,
        );
        let update_groups =
            group_by_key(text_values(updates, geo)?, numeric_values(updates, update_field)?);

        let mut joined: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for (key, acc) in enrol_groups {
            joined.entry(key).or_default().0 = acc.sum;
        }
        for (key, acc) in update_groups {
            joined.entry(key).or_default().1 = acc.sum;
        }

        let mut rows: Vec<(String, f64, f64, Option<f64>)> = joined
            .into_iter()
            .map(|(key, (enrol, upd))| {
                let ratio = (enrol != 0.0).then(|| round2(upd / enrol * 100.0));
                (key, enrol, upd, ratio)
            })
            .collect();
        rows.sort_by(|a, b| match (a.3, b.3) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let keys: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
        let enrol: Vec<f64> = rows.iter().map(|r| r.1).collect();
        let upd: Vec<f64> = rows.iter().map(|r| r.2).collect();
        let ratio: Vec<Option<f64>> = rows.iter().map(|r| r.3).collect();

        Ok(DataFrame::new(vec![
            Column::new(geo.into(), keys),
            Column::new("enrolments".into(), enrol),
            Column::new("updates".into(), upd),
            Column::new("update_ratio".into(), ratio),
        ])?)
    }
}
