//! Threshold filters over candidate sets.
//!
//! Score criteria (`pvalue`, `divergence`) keep candidates whose value under
//! the named score model is at most the threshold. Attribute criteria
//! (`n_effective`, `l_effective`) need a direction: [`Comparison::Min`] keeps
//! values at or above the threshold, [`Comparison::Max`] at or below it.
//!
//! Filters compose by intersection, so the surviving set does not depend on
//! the order they are applied in.
//!
//! ```rust
//! use trsift_core::filter::{Comparison, FilterSpec, apply_filters};
//! use trsift_core::types::{Candidate, CandidateSet, RepeatScore, ScoreModel};
//!
//! let model = ScoreModel::default();
//! let set: CandidateSet = vec![
//!     Candidate::from_alignment(1, ["PEL", "PEL", "PEL"])?
//!         .with_score(model.clone(), RepeatScore::new(0.001, 0.02)),
//!     Candidate::from_alignment(40, ["KR", "KR"])?
//!         .with_score(model.clone(), RepeatScore::new(0.3, 0.02)),
//! ]
//! .into();
//!
//! let kept = apply_filters(
//!     &set,
//!     &[FilterSpec::pvalue(0.05), FilterSpec::n_effective(Comparison::Min, 2.5)],
//!     &model,
//! )?;
//! assert_eq!(kept.len(), 1);
//! # Ok::<(), trsift_core::types::TrsiftError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::types::{Candidate, CandidateSet, ScoreModel, TrsiftError};

/// Quantity a filter compares against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCriterion {
    /// p-value under the score model
    PValue,
    /// Unit divergence under the score model
    Divergence,
    /// Effective number of repeat units
    NEffective,
    /// Effective repeat unit length
    LEffective,
}

impl FilterCriterion {
    /// Whether the criterion is a candidate attribute that needs a
    /// [`Comparison`] direction
    #[must_use]
    pub const fn is_attribute(self) -> bool {
        matches!(self, Self::NEffective | Self::LEffective)
    }

    fn value(self, candidate: &Candidate, model: &ScoreModel) -> Option<f64> {
        match self {
            Self::PValue => candidate.pvalue(model),
            Self::Divergence => candidate.divergence(model),
            Self::NEffective => Some(candidate.n_effective),
            Self::LEffective => Some(candidate.l_effective),
        }
    }
}

impl FromStr for FilterCriterion {
    type Err = TrsiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pvalue" => Ok(Self::PValue),
            "divergence" => Ok(Self::Divergence),
            "n_effective" => Ok(Self::NEffective),
            "l_effective" => Ok(Self::LEffective),
            other => Err(TrsiftError::InvalidConfiguration(format!(
                "unsupported filter criterion '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PValue => write!(f, "pvalue"),
            Self::Divergence => write!(f, "divergence"),
            Self::NEffective => write!(f, "n_effective"),
            Self::LEffective => write!(f, "l_effective"),
        }
    }
}

/// Direction of an attribute bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Keep values greater than or equal to the threshold
    Min,
    /// Keep values less than or equal to the threshold
    Max,
}

impl FromStr for Comparison {
    type Err = TrsiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(TrsiftError::InvalidConfiguration(format!(
                "unsupported comparison '{other}' (expected min or max)"
            ))),
        }
    }
}

/// A single threshold predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub criterion: FilterCriterion,
    pub threshold: f64,
    /// Required for attribute criteria, ignored for score criteria
    pub comparison: Option<Comparison>,
}

impl FilterSpec {
    #[must_use]
    pub const fn pvalue(threshold: f64) -> Self {
        Self {
            criterion: FilterCriterion::PValue,
            threshold,
            comparison: None,
        }
    }

    #[must_use]
    pub const fn divergence(threshold: f64) -> Self {
        Self {
            criterion: FilterCriterion::Divergence,
            threshold,
            comparison: None,
        }
    }

    #[must_use]
    pub const fn n_effective(comparison: Comparison, threshold: f64) -> Self {
        Self {
            criterion: FilterCriterion::NEffective,
            threshold,
            comparison: Some(comparison),
        }
    }

    #[must_use]
    pub const fn l_effective(comparison: Comparison, threshold: f64) -> Self {
        Self {
            criterion: FilterCriterion::LEffective,
            threshold,
            comparison: Some(comparison),
        }
    }

    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidConfiguration`] for a non-finite
    /// threshold or an attribute criterion without a comparison.
    pub fn validate(&self) -> Result<(), TrsiftError> {
        if !self.threshold.is_finite() {
            return Err(TrsiftError::InvalidConfiguration(format!(
                "{} threshold {} is not a finite number",
                self.criterion, self.threshold
            )));
        }
        if self.criterion.is_attribute() && self.comparison.is_none() {
            return Err(TrsiftError::InvalidConfiguration(format!(
                "{} filter needs a min or max comparison",
                self.criterion
            )));
        }
        Ok(())
    }

    /// Whether `candidate` satisfies this predicate. Assumes a validated predicate.
    #[must_use]
    pub fn accepts(&self, candidate: &Candidate, model: &ScoreModel) -> bool {
        let Some(value) = self.criterion.value(candidate, model) else {
            return false;
        };
        match (self.criterion.is_attribute(), self.comparison) {
            (true, Some(Comparison::Min)) => value >= self.threshold,
            (true, Some(Comparison::Max)) | (false, _) => value <= self.threshold,
            (true, None) => false,
        }
    }
}

/// Applies one threshold predicate to `set`.
///
/// # Errors
///
/// Returns [`TrsiftError::InvalidConfiguration`] if the predicate is
/// malformed; the input set is left untouched in that case.
pub fn filter(
    set: &CandidateSet,
    criterion: FilterCriterion,
    model: &ScoreModel,
    threshold: f64,
    comparison: Option<Comparison>,
) -> Result<CandidateSet, TrsiftError> {
    apply_filters(
        set,
        &[FilterSpec {
            criterion,
            threshold,
            comparison,
        }],
        model,
    )
}

/// Applies every predicate in `specs` in order.
///
/// All predicates are validated before any is applied, so an invalid
/// predicate late in the list never leaves a partially filtered result.
///
/// # Errors
///
/// Returns [`TrsiftError::InvalidConfiguration`] for the first malformed
/// predicate.
pub fn apply_filters(
    set: &CandidateSet,
    specs: &[FilterSpec],
    model: &ScoreModel,
) -> Result<CandidateSet, TrsiftError> {
    for spec in specs {
        spec.validate()?;
    }

    let mut current = set.clone();
    for spec in specs {
        let before = current.len();
        current = current.retain_matching(|candidate| spec.accepts(candidate, model));
        debug!(
            "{} filter ({}): {} -> {} candidates",
            spec.criterion,
            spec.threshold,
            before,
            current.len()
        );
    }
    Ok(current)
}

/// Whether `candidate` passes every predicate in `specs`
#[must_use]
pub fn passes_all(candidate: &Candidate, specs: &[FilterSpec], model: &ScoreModel) -> bool {
    specs.iter().all(|spec| spec.accepts(candidate, model))
}
