//! # Reference Model
//!
//! The fitted artifact for one reference cohort: the transform pipeline, the PC2
//! reference interval derived from it, the back-projected equation and the
//! settings used. Everything downstream (evaluation, case scoring, boundary
//! curves) reads this value and never mutates it.

use crate::config::{AnalysisConfig, ConfigError};
use crate::evaluate::{DiagnosticEvaluator, PerformanceRecord};
use crate::interval::{
    BoundaryCurve, BoundaryKind, EquationParameters, IntervalError, ReferenceInterval,
};
use crate::transform::{Decomposition, ReferencePipeline, TransformError};
use crate::types::MeasurementMatrix;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("Reference interval error: {0}")]
    Interval(#[from] IntervalError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// PC2 score and classification of one scored case.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaseScore {
    pub pc2: f64,
    pub abnormal: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceModel {
    /// Smallest and largest `x1` in the reference cohort.
    pub x1_range: (f64, f64),
    pub config: AnalysisConfig,
    pub pipeline: ReferencePipeline,
    pub interval: ReferenceInterval,
    pub equation: EquationParameters,
}

/// A model together with the fit-time by-products that are not worth persisting.
#[derive(Clone, Debug)]
pub struct FittedReference {
    pub model: ReferenceModel,
    pub decomposition: Decomposition,
    /// PC2 score of every reference subject, in input order.
    pub reference_pc2: Array1<f64>,
}

impl ReferenceModel {
    /// Fits the pipeline on `reference`, derives the PC2 interval at the configured
    /// percentiles and back-projects the equation.
    pub fn fit(
        reference: &MeasurementMatrix,
        config: &AnalysisConfig,
    ) -> Result<FittedReference, ModelError> {
        config.validate()?;

        let fitted = ReferencePipeline::fit(reference.as_view())?;
        let reference_pc2 = fitted.reference_pc2();
        let interval = ReferenceInterval::estimate(reference_pc2.view(), config.percentiles)?;
        let equation = EquationParameters::back_project(&fitted.pipeline)?;

        let x1 = reference.column(0);
        let x1_range = x1
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        log::info!(
            "PC2 reference interval at [{}, {}] percentiles: [{:.4}, {:.4}]",
            config.percentiles.lower,
            config.percentiles.upper,
            interval.lower(),
            interval.upper()
        );

        Ok(FittedReference {
            model: Self {
                x1_range,
                config: config.clone(),
                pipeline: fitted.pipeline,
                interval,
                equation,
            },
            decomposition: fitted.decomposition,
            reference_pc2,
        })
    }

    pub fn pc2_scores(&self, raw: ArrayView2<'_, f64>) -> Result<Array1<f64>, TransformError> {
        self.pipeline.pc2_raw(raw)
    }

    /// PC2 score and abnormal flag for every case, in input order.
    pub fn score_cases(
        &self,
        cases: &MeasurementMatrix,
    ) -> Result<Vec<CaseScore>, TransformError> {
        let scores = self.pc2_scores(cases.as_view())?;
        Ok(scores
            .iter()
            .map(|&pc2| CaseScore {
                pc2,
                abnormal: self.interval.flags_abnormal(pc2),
            })
            .collect())
    }

    pub fn evaluator(&self) -> DiagnosticEvaluator<'_> {
        DiagnosticEvaluator::new(&self.pipeline, self.interval, self.config.ratio_interval)
    }

    /// Compares the fixed-ratio and PC2 rules. `abnormal` may be absent or empty,
    /// in which case sensitivities are undefined.
    pub fn evaluate(
        &self,
        reference: ArrayView2<'_, f64>,
        abnormal: Option<ArrayView2<'_, f64>>,
    ) -> Result<PerformanceRecord, TransformError> {
        self.evaluator().evaluate(reference, abnormal)
    }

    /// Equation parameters followed by the interval bounds, as `(name, value)`.
    pub fn summary(&self) -> Vec<(&'static str, f64)> {
        let mut rows: Vec<(&'static str, f64)> = self.equation.named().to_vec();
        rows.push(("PCA_RI_low", self.interval.lower()));
        rows.push(("PCA_RI_high", self.interval.upper()));
        rows
    }

    /// Both fixed-ratio lines over the reference `x1` range and both PC2 bounds
    /// traced over `pc1_range`.
    pub fn boundaries(
        &self,
        pc1_range: (f64, f64),
        grid_points: usize,
    ) -> Result<Vec<BoundaryCurve>, TransformError> {
        let ratio = self.config.ratio_interval;
        Ok(vec![
            BoundaryCurve::fixed_ratio(
                BoundaryKind::RatioLower,
                ratio.lower(),
                self.x1_range,
                grid_points,
            ),
            BoundaryCurve::fixed_ratio(
                BoundaryKind::RatioUpper,
                ratio.upper(),
                self.x1_range,
                grid_points,
            ),
            BoundaryCurve::pc2_level(
                BoundaryKind::Pc2Lower,
                &self.pipeline,
                self.interval.lower(),
                pc1_range,
                grid_points,
            )?,
            BoundaryCurve::pc2_level(
                BoundaryKind::Pc2Upper,
                &self.pipeline,
                self.interval.upper(),
                pc1_range,
                grid_points,
            )?,
        ])
    }

    /// Saves the model in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a model saved by [`ReferenceModel::save`] and re-checks its
    /// invariants: valid settings and interval, two analyte columns, and fitted
    /// states that agree on that shape with positive standard deviations.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model: Self = toml::from_str(&toml_string)?;
        model.config.validate()?;
        model.interval.validate()?;
        let n_columns = model.pipeline.standardization().n_columns();
        if n_columns != MeasurementMatrix::ANALYTES {
            return Err(TransformError::ShapeMismatch {
                expected: MeasurementMatrix::ANALYTES,
                found: n_columns,
            }
            .into());
        }
        model.pipeline.validate()?;
        Ok(model)
    }
}
