//! Model-based refinement of clustered candidates.
//!
//! Each candidate is refined on its own: a profile model is built from its
//! alignment, the sequence is rescanned with that model, and the hit is
//! accepted only if it overlaps the original and passes the same
//! significance and size filters. The outcome is one of three states:
//!
//! ```text
//! build ─┬─ error ───────────────────────────────► SkippedOnError
//!        └─ rescan ─┬─ error ────────────────────► SkippedOnError
//!                   ├─ no hit ───────────────────► Original (NoHit)
//!                   └─ hit ─┬─ no overlap ───────► Original (NoOverlap)
//!                           ├─ fails filters ────► Original (FailedThresholds)
//!                           └─ passes ───────────► Refined
//! ```
//!
//! Every outcome yields exactly one candidate, so refinement never grows a
//! set.

use std::fmt;

use log::{debug, warn};

use crate::cluster::OverlapRule;
use crate::config::FilterThresholds;
use crate::detector::{ExternalError, ProfileModeller};
use crate::filter::{FilterSpec, passes_all};
use crate::types::{Candidate, CandidateSet, Provenance, ScoreModel, Sequence};

/// Why a candidate kept its de novo form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeptReason {
    /// The rescan found nothing
    NoHit,
    /// The hit shares no residue with the original
    NoOverlap,
    /// The hit overlaps but is not significant enough
    FailedThresholds,
}

impl fmt::Display for KeptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHit => write!(f, "no hit"),
            Self::NoOverlap => write!(f, "hit does not overlap"),
            Self::FailedThresholds => write!(f, "hit failed thresholds"),
        }
    }
}

/// Result of refining one candidate.
#[derive(Debug)]
pub enum RefinementOutcome {
    /// Refined hit rejected; the original candidate stays
    Original {
        candidate: Candidate,
        reason: KeptReason,
    },
    /// Refined hit replaces the original
    Refined { candidate: Candidate },
    /// Building or rescanning failed; the original candidate stays
    SkippedOnError {
        candidate: Candidate,
        error: ExternalError,
    },
}

impl RefinementOutcome {
    /// The candidate that goes into the final set
    #[must_use]
    pub fn into_candidate(self) -> Candidate {
        match self {
            Self::Original { candidate, .. }
            | Self::Refined { candidate }
            | Self::SkippedOnError { candidate, .. } => candidate,
        }
    }

    #[must_use]
    pub const fn is_refined(&self) -> bool {
        matches!(self, Self::Refined { .. })
    }
}

/// Outcome counts of one [`Refiner::refine_all`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefinementTally {
    pub refined: usize,
    pub kept_original: usize,
    pub errors: usize,
}

impl RefinementTally {
    fn record(&mut self, outcome: &RefinementOutcome) {
        match outcome {
            RefinementOutcome::Original { .. } => self.kept_original += 1,
            RefinementOutcome::Refined { .. } => self.refined += 1,
            RefinementOutcome::SkippedOnError { .. } => self.errors += 1,
        }
    }
}

/// Refines candidates with a [`ProfileModeller`].
pub struct Refiner<'a, M: ProfileModeller> {
    modeller: &'a M,
    filters: Vec<FilterSpec>,
    score_model: ScoreModel,
    overlap: OverlapRule,
}

impl<'a, M: ProfileModeller> Refiner<'a, M> {
    /// Refined hits must pass the pvalue, divergence and minimum
    /// `n_effective` thresholds of `thresholds` under `score_model`.
    pub fn new(modeller: &'a M, thresholds: &FilterThresholds, score_model: ScoreModel) -> Self {
        Self {
            modeller,
            filters: thresholds.refinement_filters(),
            score_model,
            overlap: OverlapRule::default(),
        }
    }

    /// Refines a single candidate of `sequence`.
    pub fn refine(&self, sequence: &Sequence, candidate: &Candidate) -> RefinementOutcome {
        match self.rescan(sequence, candidate) {
            Err(error) => RefinementOutcome::SkippedOnError {
                candidate: candidate.clone(),
                error,
            },
            Ok(None) => self.keep(candidate, KeptReason::NoHit),
            Ok(Some(hit)) if !self.overlap.overlaps(&hit, candidate) => {
                self.keep(candidate, KeptReason::NoOverlap)
            }
            Ok(Some(hit)) if !passes_all(&hit, &self.filters, &self.score_model) => {
                self.keep(candidate, KeptReason::FailedThresholds)
            }
            Ok(Some(hit)) => RefinementOutcome::Refined { candidate: hit },
        }
    }

    /// Refines every candidate of `set` independently, preserving order.
    pub fn refine_all(
        &self,
        sequence: &Sequence,
        set: &CandidateSet,
    ) -> (CandidateSet, RefinementTally) {
        let mut tally = RefinementTally::default();
        let refined = set
            .iter()
            .map(|candidate| {
                let outcome = self.refine(sequence, candidate);
                tally.record(&outcome);
                match &outcome {
                    RefinementOutcome::SkippedOnError { error, .. } => warn!(
                        "{}: refinement of repeat at {} failed: {error}",
                        sequence.id, candidate.begin
                    ),
                    RefinementOutcome::Original { reason, .. } => debug!(
                        "{}: kept repeat at {} ({reason})",
                        sequence.id, candidate.begin
                    ),
                    RefinementOutcome::Refined { candidate: hit } => debug!(
                        "{}: repeat at {} refined to {}..={}",
                        sequence.id,
                        candidate.begin,
                        hit.begin,
                        hit.end()
                    ),
                }
                outcome.into_candidate()
            })
            .collect();
        (refined, tally)
    }

    /// Model build and rescan; the model is released before returning
    fn rescan(
        &self,
        sequence: &Sequence,
        candidate: &Candidate,
    ) -> Result<Option<Candidate>, ExternalError> {
        let model = self.modeller.build_model(candidate)?;
        let hit = self.modeller.rescan(sequence, &model)?;
        Ok(hit.map(|mut hit| {
            hit.provenance = Provenance::Refined;
            hit.source_model = Some(self.modeller.model_name().to_string());
            hit
        }))
    }

    fn keep(&self, candidate: &Candidate, reason: KeptReason) -> RefinementOutcome {
        RefinementOutcome::Original {
            candidate: candidate.clone(),
            reason,
        }
    }
}
