//! CSV Data Loader Module
//! Reads every CSV file of a category directory and concatenates them using Polars.

use crate::data::Category;
use glob::{glob, Pattern};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Source path not found: {0}")]
    MissingSource(PathBuf),
    #[error("No CSV files found in {0}")]
    NoFiles(PathBuf),
    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("{file} is missing column '{column}'")]
    SchemaMismatch { file: PathBuf, column: String },
}

/// Shape and missing-value overview of a loaded table.
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub null_counts: BTreeMap<String, usize>,
}

/// Loads the per-category CSV directories below one base directory.
pub struct DataLoader {
    base_path: PathBuf,
}

impl DataLoader {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, LoaderError> {
        let base_path = base_path.into();
        if !base_path.is_dir() {
            return Err(LoaderError::MissingSource(base_path));
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding the CSV files of a category.
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.base_path.join(category.spec().source_dir)
    }

    /// Load and concatenate every CSV file of a category.
    ///
    /// All columns are read as text; typing happens during cleaning.
    pub fn load_category(&self, category: Category) -> Result<DataFrame, LoaderError> {
        let dir = self.category_dir(category);
        info!("Loading {} data from {}", category, dir.display());
        if !dir.is_dir() {
            return Err(LoaderError::MissingSource(dir));
        }

        let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
        let mut files: Vec<PathBuf> = glob(&pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable entry {}: {}", e.path().display(), e);
                    None
                }
            })
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(LoaderError::NoFiles(dir));
        }
        info!("Found {} {} files", files.len(), category);

        let mut combined: Option<DataFrame> = None;
        let mut columns: Vec<String> = Vec::new();
        for file in &files {
            debug!("Reading {}", file.display());
            let df = Self::read_csv(file)?;

            match combined.as_mut() {
                None => {
                    columns = df
                        .get_column_names()
                        .iter()
                        .map(|s| s.to_string())
                        .collect();
                    combined = Some(df);
                }
                Some(acc) => {
                    if let Some(missing) = columns.iter().find(|c| df.column(c.as_str()).is_err())
                    {
                        return Err(LoaderError::SchemaMismatch {
                            file: file.clone(),
                            column: missing.clone(),
                        });
                    }
                    let aligned = df.select(columns.iter().map(|c| c.as_str()))?;
                    acc.vstack_mut(&aligned)?;
                }
            }
        }

        let df = combined.ok_or(LoaderError::NoFiles(dir))?;
        info!("Loaded {} {} records", df.height(), category);
        Ok(df)
    }

    /// Load all three categories.
    pub fn load_all(&self) -> Result<BTreeMap<Category, DataFrame>, LoaderError> {
        let mut data = BTreeMap::new();
        for category in Category::ALL {
            data.insert(category, self.load_category(category)?);
        }
        info!("All datasets loaded successfully");
        Ok(data)
    }

    /// Row count, column names and per-column null counts.
    pub fn summarize(df: &DataFrame) -> TableSummary {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let null_counts = df
            .get_columns()
            .iter()
            .map(|col| (col.name().to_string(), col.null_count()))
            .collect();

        TableSummary {
            rows: df.height(),
            columns,
            null_counts,
        }
    }

    fn read_csv(path: &Path) -> Result<DataFrame, LoaderError> {
        // Schema inference disabled: every column stays a string column
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn missing_base_directory_fails_fast() {
        let err = DataLoader::new("/definitely/not/here").err().unwrap();
        assert!(matches!(err, LoaderError::MissingSource(_)));
    }

    #[test]
    fn empty_category_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("api_data_aadhar_biometric")).unwrap();
        let loader = DataLoader::new(tmp.path()).unwrap();

        let err = loader.load_category(Category::Biometric).unwrap_err();
        assert!(matches!(err, LoaderError::NoFiles(_)));
        let err = loader.load_category(Category::Enrolment).unwrap_err();
        assert!(matches!(err, LoaderError::MissingSource(_)));
    }

    #[test]
    fn base_path_with_glob_metacharacters() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("exports [2025] *");
        let dir = base.join("api_data_aadhar_biometric");
        fs::create_dir_all(&dir).unwrap();
        write(
            &dir,
            "a.csv",
            "date,state,district,pincode,bio_age_5_17,bio_age_17_\n\
             01-03-2025,Goa,North Goa,403001,1,2\n",
        );

        let loader = DataLoader::new(&base).unwrap();
        let df = loader.load_category(Category::Biometric).unwrap();
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn concatenates_files_with_shuffled_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("api_data_aadhar_demographic");
        fs::create_dir(&dir).unwrap();
        write(
            &dir,
            "a.csv",
            "date,state,district,pincode,demo_age_5_17,demo_age_17_\n\
             01-03-2025,Goa,North Goa,403001,1,2\n",
        );
        write(
            &dir,
            "b.csv",
            "state,date,district,pincode,demo_age_17_,demo_age_5_17\n\
             Goa,02-03-2025,South Goa,403601,5,\n",
        );

        let loader = DataLoader::new(tmp.path()).unwrap();
        let df = loader.load_category(Category::Demographic).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names()[0].as_str(), "date");

        let summary = DataLoader::summarize(&df);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns.len(), 6);
    }
}
