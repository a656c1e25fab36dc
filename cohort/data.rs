//! # Cohort Loading and Validation
//!
//! The only entry point for user-provided measurements. A cohort file is a
//! delimited table with a header row; the two analyte columns (by default `kappa`
//! and `lambda`) must be present, numeric, complete and strictly positive. Any
//! other columns are kept untouched so scored cases can be written back with
//! them.
//!
//! Files ending in `.tsv` or `.txt` are read as tab-separated, everything else as
//! comma-separated. Column types are inferred from every row, so a column of whole
//! numbers with a single decimal further down still reads as numeric.

use crate::config::ColumnNames;
use crate::transform::TransformError;
use crate::types::MeasurementMatrix;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error("Input file contains no data rows.")]
    NoRows,
    #[error("Invalid measurement in '{path}': {source}")]
    InvalidMeasurement {
        path: String,
        #[source]
        source: TransformError,
    },
}

/// A loaded cohort: the full table as read, plus the validated analyte matrix.
#[derive(Debug, Clone)]
pub struct CohortTable {
    pub frame: DataFrame,
    pub measurements: MeasurementMatrix,
}

impl CohortTable {
    pub fn n_subjects(&self) -> usize {
        self.measurements.nrows()
    }
}

/// Reads a cohort file and validates its analyte columns.
pub fn load_cohort(path: &Path, columns: &ColumnNames) -> Result<CohortTable, DataError> {
    log::info!("Loading cohort from '{}'", path.display());

    let separator = match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    };
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(None)
                .with_parse_options(CsvParseOptions::default().with_separator(separator)),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::NoRows);
    }

    let present: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    for name in [&columns.x1, &columns.x2] {
        if !present.contains(name) {
            return Err(DataError::ColumnNotFound(name.clone()));
        }
    }

    let x1 = extract_numeric_column(&df, &columns.x1)?;
    let x2 = extract_numeric_column(&df, &columns.x2)?;
    let measurements = MeasurementMatrix::from_columns(&x1, &x2).map_err(|source| {
        DataError::InvalidMeasurement {
            path: path.display().to_string(),
            source,
        }
    })?;

    log::debug!(
        "Loaded {} subjects with columns '{}' and '{}'",
        measurements.nrows(),
        columns.x1,
        columns.x2
    );

    Ok(CohortTable {
        frame: df,
        measurements,
    })
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: format!("{:?}", series.dtype()),
    };
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let chunked = casted.f64()?.rechunk();
    Ok(chunked.into_no_null_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::Builder;

    fn create_test_file(content: &str, suffix: &str) -> io::Result<tempfile::NamedTempFile> {
        let mut file = Builder::new().suffix(suffix).tempfile()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn loads_csv_with_extra_columns() {
        let content =
            "sample_id,kappa,lambda,site\nA,1.2,1.5,north\nB,0.8,1.1,south\nC,2.0,1.9,north";
        let file = create_test_file(content, ".csv").unwrap();
        let cohort = load_cohort(file.path(), &ColumnNames::default()).unwrap();

        assert_eq!(cohort.n_subjects(), 3);
        assert_eq!(cohort.frame.width(), 4);
        assert_abs_diff_eq!(cohort.measurements[[0, 0]], 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(cohort.measurements[[2, 1]], 1.9, epsilon = 1e-12);
    }

    #[test]
    fn tab_separated_files_use_tabs() {
        let content = "kappa\tlambda\n1.0\t2.0\n3.0\t4.0";
        let file = create_test_file(content, ".tsv").unwrap();
        let cohort = load_cohort(file.path(), &ColumnNames::default()).unwrap();
        assert_eq!(cohort.n_subjects(), 2);
        assert_abs_diff_eq!(cohort.measurements[[1, 1]], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn integer_columns_are_accepted() {
        let content = "kappa,lambda\n1,2\n3,4";
        let file = create_test_file(content, ".csv").unwrap();
        let cohort = load_cohort(file.path(), &ColumnNames::default()).unwrap();
        assert_abs_diff_eq!(cohort.measurements[[1, 0]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn late_decimal_after_many_whole_numbers() {
        let mut content = String::from("kappa,lambda");
        for i in 0..150 {
            content.push_str(&format!("\n{},{}", 1 + i % 5, 2 + i % 3));
        }
        content.push_str("\n1.5,2.5");
        let file = create_test_file(&content, ".csv").unwrap();
        let cohort = load_cohort(file.path(), &ColumnNames::default()).unwrap();

        assert_eq!(cohort.n_subjects(), 151);
        assert_abs_diff_eq!(cohort.measurements[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cohort.measurements[[150, 0]], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(cohort.measurements[[150, 1]], 2.5, epsilon = 1e-12);
    }

    #[test]
    fn custom_column_names() {
        let content = "k,l\n1.0,2.0\n3.0,4.0";
        let file = create_test_file(content, ".csv").unwrap();
        let columns = ColumnNames {
            x1: "k".to_string(),
            x2: "l".to_string(),
        };
        assert_eq!(load_cohort(file.path(), &columns).unwrap().n_subjects(), 2);
    }

    #[test]
    fn missing_column_is_reported() {
        let content = "kappa,lam\n1.0,2.0";
        let file = create_test_file(content, ".csv").unwrap();
        match load_cohort(file.path(), &ColumnNames::default()) {
            Err(DataError::ColumnNotFound(name)) => assert_eq!(name, "lambda"),
            other => panic!("Expected ColumnNotFound(lambda), got {:?}", other),
        }
    }

    #[test]
    fn missing_values_are_reported() {
        let content = "kappa,lambda\n1.0,2.0\n,4.0";
        let file = create_test_file(content, ".csv").unwrap();
        match load_cohort(file.path(), &ColumnNames::default()) {
            Err(DataError::MissingValuesFound(name)) => assert_eq!(name, "kappa"),
            other => panic!("Expected MissingValuesFound(kappa), got {:?}", other),
        }
    }

    #[test]
    fn non_numeric_values_are_reported() {
        let content = "kappa,lambda\n1.0,2.0\nhigh,4.0";
        let file = create_test_file(content, ".csv").unwrap();
        match load_cohort(file.path(), &ColumnNames::default()) {
            Err(DataError::ColumnWrongType { column_name, .. }) => assert_eq!(column_name, "kappa"),
            other => panic!("Expected ColumnWrongType(kappa), got {:?}", other),
        }
    }

    #[test]
    fn non_positive_values_are_reported() {
        let content = "kappa,lambda\n1.0,2.0\n3.0,0.0";
        let file = create_test_file(content, ".csv").unwrap();
        match load_cohort(file.path(), &ColumnNames::default()) {
            Err(DataError::InvalidMeasurement { source, .. }) => assert!(matches!(
                source,
                TransformError::Domain {
                    row: 1,
                    column: 1,
                    ..
                }
            )),
            other => panic!("Expected InvalidMeasurement, got {:?}", other),
        }
    }

    #[test]
    fn header_only_file_has_no_rows() {
        let file = create_test_file("kappa,lambda", ".csv").unwrap();
        assert!(matches!(
            load_cohort(file.path(), &ColumnNames::default()),
            Err(DataError::NoRows)
        ));
    }
}
