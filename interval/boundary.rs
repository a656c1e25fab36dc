use crate::transform::{ReferencePipeline, TransformError};
use ndarray::{Array1, Array2};
use std::fmt;

pub const DEFAULT_GRID_POINTS: usize = 50;

/// PC1 span traced when drawing PC2 bounds in raw space.
pub const DEFAULT_PC1_RANGE: (f64, f64) = (-3.0, 7.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoundaryKind {
    RatioLower,
    RatioUpper,
    Pc2Lower,
    Pc2Upper,
}

impl BoundaryKind {
    pub fn label(self) -> &'static str {
        match self {
            BoundaryKind::RatioLower => "ratio_lower",
            BoundaryKind::RatioUpper => "ratio_upper",
            BoundaryKind::Pc2Lower => "pc2_lower",
            BoundaryKind::Pc2Upper => "pc2_upper",
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A decision boundary traced in raw `(x1, x2)` space, one point per row.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryCurve {
    pub kind: BoundaryKind,
    pub points: Array2<f64>,
}

impl BoundaryCurve {
    /// The line `x2 = x1 / ratio` over `x1_range`.
    pub fn fixed_ratio(
        kind: BoundaryKind,
        ratio: f64,
        x1_range: (f64, f64),
        grid_points: usize,
    ) -> Self {
        let x1 = Array1::linspace(x1_range.0, x1_range.1, grid_points);
        let mut points = Array2::zeros((grid_points, 2));
        for (mut row, &value) in points.rows_mut().into_iter().zip(x1.iter()) {
            row[0] = value;
            row[1] = value / ratio;
        }
        Self { kind, points }
    }

    /// The set `PC2 = level`, traced for PC1 over `pc1_range` and mapped back
    /// through the inverse rotation, inverse standardization and `exp`.
    pub fn pc2_level(
        kind: BoundaryKind,
        pipeline: &ReferencePipeline,
        level: f64,
        pc1_range: (f64, f64),
        grid_points: usize,
    ) -> Result<Self, TransformError> {
        let pc1 = Array1::linspace(pc1_range.0, pc1_range.1, grid_points);
        let mut scores = Array2::from_elem((grid_points, 2), level);
        scores.column_mut(0).assign(&pc1);
        let points = pipeline.to_raw(scores.view())?;
        Ok(Self { kind, points })
    }
}
