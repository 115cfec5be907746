//! Cleaning report: per-category row accounting for one run.

use crate::data::Category;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Row accounting of a single cleaning call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub initial_rows: usize,
    pub final_rows: usize,
    pub rows_removed: usize,
    pub invalid_dates: usize,
    pub invalid_pincodes: usize,
    pub zero_totals: usize,
}

impl CleaningStats {
    /// Share of input rows dropped, in percent. `None` for an empty input.
    pub fn removed_pct(&self) -> Option<f64> {
        (self.initial_rows > 0)
            .then(|| self.rows_removed as f64 / self.initial_rows as f64 * 100.0)
    }
}

/// Append-only collection of [`CleaningStats`] keyed by category.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CleaningReport {
    entries: BTreeMap<Category, CleaningStats>,
}

impl CleaningReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of cleaning `category`. A repeated category replaces its entry.
    pub fn record(&mut self, category: Category, stats: CleaningStats) {
        self.entries.insert(category, stats);
    }

    pub fn get(&self, category: Category) -> Option<&CleaningStats> {
        self.entries.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, &CleaningStats)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "DATA CLEANING REPORT")?;
        writeln!(f, "{}", "=".repeat(60))?;

        for (category, stats) in &self.entries {
            writeln!(f)?;
            writeln!(f, "{} Dataset:", category.name().to_uppercase())?;
            writeln!(f, "  Initial rows: {}", stats.initial_rows)?;
            writeln!(f, "  Final rows: {}", stats.final_rows)?;
            match stats.removed_pct() {
                Some(pct) => writeln!(f, "  Rows removed: {} ({:.2}%)", stats.rows_removed, pct)?,
                None => writeln!(f, "  Rows removed: {}", stats.rows_removed)?,
            }
            writeln!(f, "  Invalid dates: {}", stats.invalid_dates)?;
            writeln!(f, "  Invalid pincodes: {}", stats.invalid_pincodes)?;
            writeln!(f, "  Zero counts: {}", stats.zero_totals)?;
        }
        Ok(())
    }
}
