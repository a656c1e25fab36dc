//! # Diagnostic Performance
//!
//! Compares the manufacturer's fixed kappa/lambda ratio interval with the PC2
//! reference interval. The reference cohort is taken to be all negatives and the
//! abnormal cohort all positives, so specificity is the share of the reference
//! cohort classified normal and sensitivity the share of the abnormal cohort
//! flagged. A rate over an empty or absent cohort is `None`, never zero.

use crate::interval::ReferenceInterval;
use crate::transform::{ReferencePipeline, TransformError, validate_positive};
use ndarray::ArrayView2;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecisionRule {
    /// `x1 / x2` outside the fixed manufacturer interval.
    FixedRatio,
    /// PC2 score outside the derived reference interval.
    DerivedInterval,
}

impl DecisionRule {
    pub const ALL: [DecisionRule; 2] = [DecisionRule::FixedRatio, DecisionRule::DerivedInterval];

    pub fn name(self) -> &'static str {
        match self {
            DecisionRule::FixedRatio => "sFLC_ratio",
            DecisionRule::DerivedInterval => "PC2",
        }
    }

    /// Prefix of the `<prefix>_Sp` / `<prefix>_Se` measure names.
    pub fn measure_prefix(self) -> &'static str {
        match self {
            DecisionRule::FixedRatio => "sFLC",
            DecisionRule::DerivedInterval => "PC",
        }
    }
}

impl fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many subjects of one cohort a rule flagged as abnormal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CohortTally {
    pub flagged: usize,
    pub total: usize,
}

impl CohortTally {
    pub fn from_flags(flags: &[bool]) -> Self {
        Self {
            flagged: flags.iter().filter(|&&flag| flag).count(),
            total: flags.len(),
        }
    }

    pub fn normal(&self) -> usize {
        self.total - self.flagged
    }
}

/// `hits / total`, or `None` when there is nothing to divide by.
pub fn rate(hits: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| hits as f64 / total as f64)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RulePerformance {
    pub specificity: Option<f64>,
    pub sensitivity: Option<f64>,
    pub reference: CohortTally,
    pub abnormal: CohortTally,
}

impl RulePerformance {
    pub fn from_tallies(reference: CohortTally, abnormal: CohortTally) -> Self {
        Self {
            specificity: rate(reference.normal(), reference.total),
            sensitivity: rate(abnormal.flagged, abnormal.total),
            reference,
            abnormal,
        }
    }
}

/// Sensitivity and specificity per decision rule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerformanceRecord {
    rules: BTreeMap<DecisionRule, RulePerformance>,
}

impl PerformanceRecord {
    pub fn insert(&mut self, rule: DecisionRule, performance: RulePerformance) {
        self.rules.insert(rule, performance);
    }

    pub fn get(&self, rule: DecisionRule) -> Option<&RulePerformance> {
        self.rules.get(&rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DecisionRule, &RulePerformance)> {
        self.rules.iter().map(|(rule, performance)| (*rule, performance))
    }

    /// Flattened `(measure, value)` rows: `sFLC_Sp`, `sFLC_Se`, `PC_Sp`, `PC_Se`.
    pub fn measures(&self) -> Vec<(String, Option<f64>)> {
        self.iter()
            .flat_map(|(rule, performance)| {
                let prefix = rule.measure_prefix();
                [
                    (format!("{prefix}_Sp"), performance.specificity),
                    (format!("{prefix}_Se"), performance.sensitivity),
                ]
            })
            .collect()
    }
}

/// Abnormal flags of the fixed-ratio rule for every row of `cohort`.
pub fn fixed_ratio_flags(
    cohort: ArrayView2<'_, f64>,
    interval: &ReferenceInterval,
) -> Result<Vec<bool>, TransformError> {
    if cohort.nrows() == 0 {
        return Ok(Vec::new());
    }
    if cohort.ncols() != 2 {
        return Err(TransformError::ShapeMismatch {
            expected: 2,
            found: cohort.ncols(),
        });
    }
    validate_positive(cohort)?;
    Ok(cohort
        .rows()
        .into_iter()
        .map(|row| interval.flags_abnormal(row[0] / row[1]))
        .collect())
}

/// Abnormal flags of the PC2 rule for every row of `cohort`.
pub fn derived_interval_flags(
    cohort: ArrayView2<'_, f64>,
    pipeline: &ReferencePipeline,
    interval: &ReferenceInterval,
) -> Result<Vec<bool>, TransformError> {
    if cohort.nrows() == 0 {
        return Ok(Vec::new());
    }
    Ok(pipeline
        .pc2_raw(cohort)?
        .iter()
        .map(|&score| interval.flags_abnormal(score))
        .collect())
}

/// Evaluates both decision rules against one labeled cohort pair.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticEvaluator<'a> {
    pipeline: &'a ReferencePipeline,
    derived_interval: ReferenceInterval,
    ratio_interval: ReferenceInterval,
}

impl<'a> DiagnosticEvaluator<'a> {
    pub fn new(
        pipeline: &'a ReferencePipeline,
        derived_interval: ReferenceInterval,
        ratio_interval: ReferenceInterval,
    ) -> Self {
        Self {
            pipeline,
            derived_interval,
            ratio_interval,
        }
    }

    pub fn flags(
        &self,
        rule: DecisionRule,
        cohort: ArrayView2<'_, f64>,
    ) -> Result<Vec<bool>, TransformError> {
        match rule {
            DecisionRule::FixedRatio => fixed_ratio_flags(cohort, &self.ratio_interval),
            DecisionRule::DerivedInterval => {
                derived_interval_flags(cohort, self.pipeline, &self.derived_interval)
            }
        }
    }

    /// Both rules on the reference cohort and, when given, the abnormal cohort.
    ///
    /// Every flag is computed before the record is assembled, so an invalid
    /// measurement in either cohort fails the whole evaluation.
    pub fn evaluate(
        &self,
        reference: ArrayView2<'_, f64>,
        abnormal: Option<ArrayView2<'_, f64>>,
    ) -> Result<PerformanceRecord, TransformError> {
        let mut record = PerformanceRecord::default();
        for rule in DecisionRule::ALL {
            let reference_tally = CohortTally::from_flags(&self.flags(rule, reference)?);
            let abnormal_tally = match abnormal {
                Some(cohort) => CohortTally::from_flags(&self.flags(rule, cohort)?),
                None => CohortTally::default(),
            };
            let performance = RulePerformance::from_tallies(reference_tally, abnormal_tally);
            log::info!(
                "{rule}: specificity {:?} ({}/{} normal), sensitivity {:?} ({}/{} flagged)",
                performance.specificity,
                reference_tally.normal(),
                reference_tally.total,
                performance.sensitivity,
                abnormal_tally.flagged,
                abnormal_tally.total
            );
            record.insert(rule, performance);
        }
        Ok(record)
    }
}
