//! Data module - CSV loading, cleaning and the cleaning report

mod category;
pub mod columns;
mod loader;
mod processor;
mod report;

pub use category::{
    Category, CategorySpec, UnknownCategory, DATE_COLUMN, GEO_TEXT_COLUMNS, PINCODE_COLUMN,
};
pub use loader::{DataLoader, LoaderError, TableSummary};
pub use processor::{
    normalize_pincode, title_case, DataProcessor, OutlierMethod, ProcessorError, PINCODE_LEN,
};
pub use report::{CleaningReport, CleaningStats};
