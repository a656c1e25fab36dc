//! CSV result files written by the command line.

use crate::cohort::data::CohortTable;
use crate::evaluate::PerformanceRecord;
use crate::interval::BoundaryCurve;
use crate::model::CaseScore;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PC_VARS_FILE: &str = "pc_vars.csv";
pub const PERFORMANCE_FILE: &str = "performance.csv";
pub const CASES_FILE: &str = "cases_pc2.csv";
pub const BOUNDARIES_FILE: &str = "boundaries.csv";
pub const MODEL_FILE: &str = "model.toml";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Got {scores} case scores for a table with {rows} rows.")]
    LengthMismatch { rows: usize, scores: usize },
}

/// A directory that result files are written into. Created on construction.
#[derive(Clone, Debug)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, OutputError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// `var,value` rows, one per named parameter.
    pub fn write_pc_vars(&self, rows: &[(&str, f64)]) -> Result<PathBuf, OutputError> {
        let names: Vec<&str> = rows.iter().map(|(name, _)| *name).collect();
        let values: Vec<f64> = rows.iter().map(|(_, value)| *value).collect();
        let mut df = DataFrame::new(vec![
            Series::new("var".into(), names).into(),
            Series::new("value".into(), values).into(),
        ])?;
        self.write_frame(PC_VARS_FILE, &mut df)
    }

    /// `measure,value` rows; undefined rates become empty cells.
    pub fn write_performance(&self, record: &PerformanceRecord) -> Result<PathBuf, OutputError> {
        let (names, values): (Vec<String>, Vec<Option<f64>>) =
            record.measures().into_iter().unzip();
        let mut df = DataFrame::new(vec![
            Series::new("measure".into(), names).into(),
            Series::new("value".into(), values).into(),
        ])?;
        self.write_frame(PERFORMANCE_FILE, &mut df)
    }

    /// The cases table as read, with `pc2` and `abnormal` appended.
    pub fn write_cases(
        &self,
        cases: &CohortTable,
        scores: &[CaseScore],
    ) -> Result<PathBuf, OutputError> {
        if scores.len() != cases.frame.height() {
            return Err(OutputError::LengthMismatch {
                rows: cases.frame.height(),
                scores: scores.len(),
            });
        }
        let pc2: Vec<f64> = scores.iter().map(|score| score.pc2).collect();
        let abnormal: Vec<bool> = scores.iter().map(|score| score.abnormal).collect();

        let mut df = cases.frame.clone();
        df.with_column(Series::new("pc2".into(), pc2))?;
        df.with_column(Series::new("abnormal".into(), abnormal))?;
        self.write_frame(CASES_FILE, &mut df)
    }

    /// Long format: one `boundary,x1,x2` row per curve point.
    pub fn write_boundaries(&self, curves: &[BoundaryCurve]) -> Result<PathBuf, OutputError> {
        let total: usize = curves.iter().map(|curve| curve.points.nrows()).sum();
        let mut labels = Vec::with_capacity(total);
        let mut x1 = Vec::with_capacity(total);
        let mut x2 = Vec::with_capacity(total);
        for curve in curves {
            for point in curve.points.rows() {
                labels.push(curve.kind.label());
                x1.push(point[0]);
                x2.push(point[1]);
            }
        }
        let mut df = DataFrame::new(vec![
            Series::new("boundary".into(), labels).into(),
            Series::new("x1".into(), x1).into(),
            Series::new("x2".into(), x2).into(),
        ])?;
        self.write_frame(BOUNDARIES_FILE, &mut df)
    }

    fn write_frame(&self, file_name: &str, df: &mut DataFrame) -> Result<PathBuf, OutputError> {
        let path = self.join(file_name);
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        log::debug!("Wrote {} rows to '{}'", df.height(), path.display());
        Ok(path)
    }
}
