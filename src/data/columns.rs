//! Typed column accessors over Polars frames.
//!
//! Raw tables arrive with every column as text, while tables built in code
//! carry real dtypes; these helpers read either shape into plain vectors.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

/// Fixed day-month-year format of the source files.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_FROM_CE)?)
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

/// Parse one raw date cell; impossible calendar dates yield `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Parse one raw numeric cell; blanks and garbage yield `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Read a column as numbers. Text columns are parsed cell by cell.
pub fn numeric_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?;
    if matches!(column.dtype(), DataType::String) {
        return Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_number))
            .collect());
    }

    let as_f64 = column.cast(&DataType::Float64)?;
    Ok(as_f64
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Present values only, in row order.
pub fn present_numbers(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    Ok(numeric_values(df, name)?.into_iter().flatten().collect())
}

/// Read a column as text, rendering non-text dtypes with Polars' own cast.
pub fn text_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    let as_text = column.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim_matches('"').to_string()))
        .collect())
}

/// Read a column as calendar dates. Text cells use [`DATE_FORMAT`].
pub fn date_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let column = df.column(name)?;
    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|v| v.and_then(days_to_date))
                .collect())
        }
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_date))
            .collect()),
        _ => {
            let as_text = column.cast(&DataType::String)?;
            Ok(as_text
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_date))
                .collect())
        }
    }
}

/// Build a Polars `Date` column from chrono dates.
pub fn date_column(name: &str, dates: &[Option<NaiveDate>]) -> PolarsResult<Column> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(date_to_days)).collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_round_trip() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(epoch), 0);
        assert_eq!(days_to_date(0), Some(epoch));
    }

    #[test]
    fn rejects_impossible_dates() {
        assert_eq!(parse_date("31-02-2024"), None);
        assert_eq!(parse_date("garbage"), None);
        assert_eq!(
            parse_date(" 29-02-2024 "),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn reads_text_and_numeric_columns_alike() {
        let df = DataFrame::new(vec![
            Column::new("a".into(), vec!["1", " 2.5 ", "x"]),
            Column::new("b".into(), vec![Some(1.0), None, Some(3.0)]),
        ])
        .unwrap();

        assert_eq!(
            numeric_values(&df, "a").unwrap(),
            vec![Some(1.0), Some(2.5), None]
        );
        assert_eq!(present_numbers(&df, "b").unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn date_column_reads_back() {
        let dates = vec![NaiveDate::from_ymd_opt(2025, 3, 1), None];
        let column = date_column("date", &dates).unwrap();
        let df = DataFrame::new(vec![column]).unwrap();
        assert_eq!(date_values(&df, "date").unwrap(), dates);
    }
}
