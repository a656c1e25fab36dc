//! Analysis settings shared by the library and the command line.
//!
//! Every setting has a default, so a TOML file only needs the keys it overrides:
//!
//! ```toml
//! [percentiles]
//! lower = 2.5
//! upper = 97.5
//!
//! [ratio_interval]
//! lower = 0.26
//! upper = 1.65
//!
//! [columns]
//! x1 = "kappa"
//! x2 = "lambda"
//! ```

use crate::interval::{IntervalError, PercentileBounds, ReferenceInterval};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Invalid interval settings: {0}")]
    Interval(#[from] IntervalError),
    #[error("The fixed ratio interval must be positive, but its lower bound is {0}.")]
    NonPositiveRatio(f64),
    #[error("Column names must be non-empty and distinct, found '{x1}' and '{x2}'.")]
    InvalidColumns { x1: String, x2: String },
}

/// Names of the two analyte columns in cohort files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    pub x1: String,
    pub x2: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            x1: "kappa".to_string(),
            x2: "lambda".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Percentiles of the reference PC2 distribution used as interval bounds.
    pub percentiles: PercentileBounds,
    /// The manufacturer's kappa/lambda ratio interval.
    pub ratio_interval: ReferenceInterval,
    pub columns: ColumnNames,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            percentiles: PercentileBounds::default(),
            ratio_interval: ReferenceInterval::manufacturer_ratio(),
            columns: ColumnNames::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.percentiles.validate()?;
        self.ratio_interval.validate()?;
        if self.ratio_interval.lower() <= 0.0 {
            return Err(ConfigError::NonPositiveRatio(self.ratio_interval.lower()));
        }
        let ColumnNames { x1, x2 } = &self.columns;
        if x1.is_empty() || x2.is_empty() || x1 == x2 {
            return Err(ConfigError::InvalidColumns {
                x1: x1.clone(),
                x2: x2.clone(),
            });
        }
        Ok(())
    }
}
