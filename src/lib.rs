//! Registry Analytics - cleaning, statistics and charts for registry
//! enrolment and update records.

pub mod charts;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod stats;
