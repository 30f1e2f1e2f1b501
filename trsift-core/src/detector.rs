//! Seams to the repeat detection and profile modelling tools.
//!
//! Neither de novo detection nor profile-model construction happens in this
//! crate. They are reached through the [`Detector`] and [`ProfileModeller`]
//! traits, which receive everything they need as arguments; no tool keeps
//! process-wide state between calls.
//!
//! Implementations shipped here:
//!
//! - [`TableDetector`]: serves precomputed candidates from a merged table
//! - [`NullModeller`]: never finds a refined hit, so every candidate keeps
//!   its de novo form
//! - [`crate::external::CommandDetector`] and
//!   [`crate::external::CommandModeller`]: wrap external programs

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;

use crate::output::read_merged_table;
use crate::types::{Candidate, CandidateSet, ScoreModel, Sequence, TrsiftError};

/// Failure of a detector or modeller call.
///
/// These errors are recoverable: the pipeline skips the affected protein
/// (or keeps the unrefined candidate) and carries on with the batch.
#[derive(Error, Debug)]
pub enum ExternalError {
    /// Could not start the tool or exchange data with it
    #[error("I/O error running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// Tool exited unsuccessfully
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    /// Tool exceeded its time limit and was killed
    #[error("{tool} did not finish within {seconds} s")]
    Timeout { tool: String, seconds: u64 },
    /// Tool finished but its output could not be used
    #[error("unusable output from {tool}: {reason}")]
    Output { tool: String, reason: String },
    /// Any other detector-specific failure
    #[error("{0}")]
    Other(String),
}

/// De novo tandem repeat detection on one protein.
pub trait Detector: Sync {
    /// Raw, scored candidates for `sequence`, in detection order.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError`] when the detector cannot produce a result
    /// for this sequence.
    fn detect(&self, sequence: &Sequence) -> Result<CandidateSet, ExternalError>;
}

/// Builds a profile model from one candidate and rescans a sequence with it.
pub trait ProfileModeller: Sync {
    /// Handle to a built model, owned by the refinement of one candidate
    type Model;

    /// Label stored as the source model of refined candidates
    fn model_name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`ExternalError`] when no model can be built from the
    /// candidate alignment.
    fn build_model(&self, candidate: &Candidate) -> Result<Self::Model, ExternalError>;

    /// Best hit of `model` in `sequence`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError`] when the scan itself fails.
    fn rescan(
        &self,
        sequence: &Sequence,
        model: &Self::Model,
    ) -> Result<Option<Candidate>, ExternalError>;
}

/// Modeller that never produces a refined hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullModeller;

impl ProfileModeller for NullModeller {
    type Model = ();

    fn model_name(&self) -> &str {
        "none"
    }

    fn build_model(&self, _candidate: &Candidate) -> Result<Self::Model, ExternalError> {
        Ok(())
    }

    fn rescan(
        &self,
        _sequence: &Sequence,
        _model: &Self::Model,
    ) -> Result<Option<Candidate>, ExternalError> {
        Ok(None)
    }
}

/// Detector backed by a precomputed candidate table.
///
/// The table has the merged result layout: an `ID` column followed by the
/// per-protein columns. Proteins absent from the table have no candidates.
///
/// # Examples
///
/// ```rust
/// use trsift_core::detector::{Detector, TableDetector};
/// use trsift_core::types::{ScoreModel, Sequence};
///
/// let table = "ID\tbegin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\tdivergence\tpvalue\n\
///              P1\t3\tPEL,PEL,PEL\t3\t3\t9\t0.01\t0.001\n";
/// let detector = TableDetector::from_reader(table.as_bytes(), &ScoreModel::default())?;
///
/// let hits = detector.detect(&Sequence::new("P1", "MKPELPELPELQ"))?;
/// assert_eq!(hits.len(), 1);
/// assert!(detector.detect(&Sequence::new("P2", "MKV"))?.is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    by_protein: HashMap<String, CandidateSet>,
}

impl TableDetector {
    /// # Errors
    ///
    /// Returns [`TrsiftError`] if the file cannot be read or a row is
    /// malformed.
    pub fn from_path<P: AsRef<Path>>(path: P, model: &ScoreModel) -> Result<Self, TrsiftError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file), model)
    }

    /// # Errors
    ///
    /// Returns [`TrsiftError`] if a row is malformed or the `ID` column is
    /// missing.
    pub fn from_reader<R: std::io::BufRead>(
        reader: R,
        model: &ScoreModel,
    ) -> Result<Self, TrsiftError> {
        let by_protein = read_merged_table(reader, model)?.into_iter().collect();
        Ok(Self { by_protein })
    }

    /// Number of proteins with at least one candidate
    #[must_use]
    pub fn protein_count(&self) -> usize {
        self.by_protein.len()
    }
}

impl FromIterator<(String, CandidateSet)> for TableDetector {
    fn from_iter<T: IntoIterator<Item = (String, CandidateSet)>>(iter: T) -> Self {
        Self {
            by_protein: iter.into_iter().collect(),
        }
    }
}

impl Detector for TableDetector {
    fn detect(&self, sequence: &Sequence) -> Result<CandidateSet, ExternalError> {
        Ok(self
            .by_protein
            .get(&sequence.id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepeatScore;

    #[test]
    fn test_null_modeller_never_hits() {
        let modeller = NullModeller;
        let candidate = Candidate::from_alignment(1, ["AB", "AB", "AB"]).unwrap();
        let model = modeller.build_model(&candidate).unwrap();
        let hit = modeller
            .rescan(&Sequence::new("P1", "ABABAB"), &model)
            .unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn test_table_detector_from_sets() {
        let candidate = Candidate::from_alignment(2, ["QQ", "QQ", "QQ"])
            .unwrap()
            .with_score(ScoreModel::default(), RepeatScore::new(0.01, 0.0));
        let detector: TableDetector =
            vec![("P9".to_string(), CandidateSet::from(vec![candidate]))]
                .into_iter()
                .collect();

        assert_eq!(detector.protein_count(), 1);
        let hits = detector.detect(&Sequence::new("P9", "MQQQQQQ")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.get(0).unwrap().begin, 2);
    }

    #[test]
    fn test_table_detector_groups_rows_by_protein() {
        let table = "ID\tbegin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\tdivergence\tpvalue\n\
                     P1\t1\tAB,AB,AB\t2\t3\t6\t0.0\t0.01\n\
                     P2\t4\tCD,CD,CD\t2\t3\t6\t0.05\t0.02\n\
                     P1\t20\tEFG,EFG,EFG\t3\t3\t9\t0.02\t0.03\n";
        let detector =
            TableDetector::from_reader(table.as_bytes(), &ScoreModel::default()).unwrap();

        assert_eq!(detector.protein_count(), 2);
        let p1 = detector.detect(&Sequence::new("P1", "")).unwrap();
        let begins: Vec<usize> = p1.iter().map(|c| c.begin).collect();
        assert_eq!(begins, vec![1, 20]);
    }

    #[test]
    fn test_table_detector_missing_file() {
        let result = TableDetector::from_path("no_such_table.tsv", &ScoreModel::default());
        assert!(matches!(result, Err(TrsiftError::IoError(_))));
    }

    #[test]
    fn test_external_error_messages() {
        let timeout = ExternalError::Timeout {
            tool: "tral".to_string(),
            seconds: 5,
        };
        assert_eq!(timeout.to_string(), "tral did not finish within 5 s");
    }
}
