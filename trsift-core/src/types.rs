use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::constants::{DEFAULT_SCORE_MODEL, GAP_CHARACTER};
use crate::detector::ExternalError;

/// Identifier of the statistical model that p-values and divergences are
/// computed under (for example `phylo_gap01`).
///
/// Scores from different models are never comparable, so every lookup of a
/// candidate score names the model explicitly.
///
/// # Examples
///
/// ```rust
/// use trsift_core::types::ScoreModel;
///
/// let model = ScoreModel::default();
/// assert_eq!(model.as_str(), "phylo_gap01");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScoreModel(String);

impl ScoreModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScoreModel {
    fn default() -> Self {
        Self(DEFAULT_SCORE_MODEL.to_string())
    }
}

impl fmt::Display for ScoreModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Significance and unit divergence of a candidate under one score model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepeatScore {
    /// Probability of observing the repeat by chance, in `[0, 1]`
    pub pvalue: f64,
    /// Estimated divergence between repeat units, non-negative
    pub divergence: f64,
}

impl RepeatScore {
    #[must_use]
    pub const fn new(pvalue: f64, divergence: f64) -> Self {
        Self { pvalue, divergence }
    }
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Produced by the de novo detector
    #[default]
    Denovo,
    /// Produced by rescanning the sequence with a profile model
    Refined,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denovo => write!(f, "denovo"),
            Self::Refined => write!(f, "refined"),
        }
    }
}

/// One tandem repeat detected in one protein sequence.
///
/// The candidate occupies the closed residue range
/// `begin..=begin + region_length - 1` (1-based).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// First residue of the repeat region (1-based)
    pub begin: usize,
    /// Multiple sequence alignment of the repeat units, one string per copy
    pub period_alignment: Vec<String>,
    /// Effective length of a repeat unit
    pub l_effective: f64,
    /// Effective number of repeat units, may be fractional
    pub n_effective: f64,
    /// Number of residues covered by the repeat region
    pub region_length: usize,
    /// Scores keyed by the model they were computed under
    pub scores: BTreeMap<ScoreModel, RepeatScore>,
    /// Detector that produced this candidate
    pub provenance: Provenance,
    /// Profile model used to find this candidate, if it was refined
    pub source_model: Option<String>,
}

impl Candidate {
    /// Builds a de novo candidate from its unit alignment.
    ///
    /// `region_length` is the number of non-gap residues in the alignment,
    /// `l_effective` the number of columns in which at most half of the
    /// units carry a gap, and `n_effective` the residue count divided by
    /// `l_effective`.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidCandidate`] when the alignment is
    /// empty, ragged, or made only of gap columns, or when `begin` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use trsift_core::types::Candidate;
    ///
    /// let candidate = Candidate::from_alignment(5, ["PEL", "PEL", "P-L"])?;
    /// assert_eq!(candidate.region_length, 8);
    /// assert_eq!(candidate.end(), 12);
    /// assert_eq!(candidate.l_effective, 3.0);
    /// # Ok::<(), trsift_core::types::TrsiftError>(())
    /// ```
    pub fn from_alignment<I, S>(begin: usize, units: I) -> Result<Self, TrsiftError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let period_alignment: Vec<String> = units.into_iter().map(Into::into).collect();
        let columns = period_alignment.first().map_or(0, String::len);
        if period_alignment.is_empty() || columns == 0 {
            return Err(TrsiftError::InvalidCandidate(format!(
                "empty alignment for repeat at {begin}"
            )));
        }
        if period_alignment.iter().any(|unit| unit.len() != columns) {
            return Err(TrsiftError::InvalidCandidate(format!(
                "repeat at {begin} has units of unequal aligned length"
            )));
        }

        let unit_count = period_alignment.len();
        let l_effective = (0..columns)
            .filter(|&column| {
                let gaps = period_alignment
                    .iter()
                    .filter(|unit| unit.as_bytes()[column] == GAP_CHARACTER)
                    .count();
                gaps * 2 <= unit_count
            })
            .count();
        if l_effective == 0 {
            return Err(TrsiftError::InvalidCandidate(format!(
                "repeat at {begin} has no informative alignment columns"
            )));
        }

        let region_length = alignment_residues(&period_alignment);
        let candidate = Self {
            begin,
            l_effective: l_effective as f64,
            n_effective: region_length as f64 / l_effective as f64,
            region_length,
            period_alignment,
            scores: BTreeMap::new(),
            provenance: Provenance::Denovo,
            source_model: None,
        };
        candidate.validate()?;
        Ok(candidate)
    }

    /// Attach a score computed under `model`
    #[must_use]
    pub fn with_score(mut self, model: ScoreModel, score: RepeatScore) -> Self {
        self.scores.insert(model, score);
        self
    }

    pub fn score(&self, model: &ScoreModel) -> Option<&RepeatScore> {
        self.scores.get(model)
    }

    pub fn pvalue(&self, model: &ScoreModel) -> Option<f64> {
        self.score(model).map(|score| score.pvalue)
    }

    pub fn divergence(&self, model: &ScoreModel) -> Option<f64> {
        self.score(model).map(|score| score.divergence)
    }

    /// Last residue covered by the repeat (1-based, inclusive)
    #[must_use]
    pub const fn end(&self) -> usize {
        (self.begin + self.region_length).saturating_sub(1)
    }

    /// Whether both candidates claim at least one common residue.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.begin <= other.end() && other.begin <= self.end()
    }

    /// Comma-joined unit alignment, as written in the `msa_original` column
    pub fn msa_original(&self) -> String {
        self.period_alignment.join(",")
    }

    /// Checks the structural invariants of a candidate.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidCandidate`] describing the first
    /// violated invariant.
    pub fn validate(&self) -> Result<(), TrsiftError> {
        let invalid = |reason: String| {
            Err(TrsiftError::InvalidCandidate(format!(
                "repeat at {}: {reason}",
                self.begin
            )))
        };

        if self.begin == 0 {
            return invalid("begin must be a 1-based position".to_string());
        }
        if self.period_alignment.is_empty() {
            return invalid("alignment has no units".to_string());
        }
        if !(self.l_effective.is_finite() && self.l_effective > 0.0) {
            return invalid(format!("l_effective {} is not positive", self.l_effective));
        }
        if !(self.n_effective.is_finite() && self.n_effective > 0.0) {
            return invalid(format!("n_effective {} is not positive", self.n_effective));
        }
        let residues = alignment_residues(&self.period_alignment);
        if self.region_length != residues {
            return invalid(format!(
                "region length {} does not match the {} aligned residues",
                self.region_length, residues
            ));
        }
        for (model, score) in &self.scores {
            if !(0.0..=1.0).contains(&score.pvalue) {
                return invalid(format!("pvalue {} under {model} outside [0, 1]", score.pvalue));
            }
            if !(score.divergence.is_finite() && score.divergence >= 0.0) {
                return invalid(format!(
                    "divergence {} under {model} is negative",
                    score.divergence
                ));
            }
        }
        Ok(())
    }
}

/// Count of non-gap residues across all units
fn alignment_residues(units: &[String]) -> usize {
    units
        .iter()
        .map(|unit| unit.bytes().filter(|&b| b != GAP_CHARACTER).count())
        .sum()
}

/// Ordered candidates of one protein, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Candidate] {
        &self.candidates
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }

    /// Keep the candidates matching `predicate`, preserving order
    #[must_use]
    pub fn retain_matching(&self, predicate: impl Fn(&Candidate) -> bool) -> Self {
        self.candidates
            .iter()
            .filter(|candidate| predicate(candidate))
            .cloned()
            .collect()
    }

    /// Whether any two candidates share a residue
    #[must_use]
    pub fn has_overlaps(&self) -> bool {
        self.candidates.iter().enumerate().any(|(i, a)| {
            self.candidates[i + 1..]
                .iter()
                .any(|b| a.overlaps(b))
        })
    }
}

impl From<Vec<Candidate>> for CandidateSet {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

impl FromIterator<Candidate> for CandidateSet {
    fn from_iter<T: IntoIterator<Item = Candidate>>(iter: T) -> Self {
        Self {
            candidates: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CandidateSet {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// A protein sequence that candidates are positioned against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// Protein identifier used for output file names
    pub id: String,
    /// Remainder of the FASTA header line, if any
    pub description: Option<String>,
    /// Amino acid residues
    pub residues: Vec<u8>,
}

impl Sequence {
    pub fn new(id: impl Into<String>, residues: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            description: None,
            residues: residues.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// Error types that can occur while filtering, clustering and refining
/// repeat candidates
#[derive(Error, Debug)]
pub enum TrsiftError {
    /// Filter, threshold or output settings that cannot be applied
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Candidate violating a structural invariant
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),
    /// File I/O operation failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Error parsing input data
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Result file whose header does not start with `begin`
    #[error("Unexpected header in {path}: {found:?}")]
    HeaderMismatch { path: PathBuf, found: String },
    /// Merge called on a directory without result files
    #[error("No result files found in {0}")]
    NoInputFiles(PathBuf),
    /// Detector or profile modeller failure
    #[error(transparent)]
    External(#[from] ExternalError),
}
