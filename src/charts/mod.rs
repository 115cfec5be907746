//! Charts module - Static chart rendering

mod data;
mod renderer;

pub use data::{Bin, ChartData, ChartError, ChartSpec};
pub use renderer::{ChartRenderer, PALETTE};
