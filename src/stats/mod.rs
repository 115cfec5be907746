//! Stats module - descriptive statistics, tests, aggregations and time series

mod aggregate;
mod analyzer;
mod calculator;
mod timeseries;

pub use aggregate::{GeoLevel, Granularity};
pub use analyzer::{Analyzer, BivariateStats, ChiSquareResult, StatsError};
pub use calculator::{ChiSquare, Correlation, StatsCalculator, UnivariateStats};
pub use timeseries::SeasonalityResult;
