//! Reading cohort tables from disk and writing analysis results back out.

pub mod data;
pub mod output;

pub use data::{CohortTable, DataError, load_cohort};
pub use output::{OutputDir, OutputError};
