use std::fmt;

use crate::types::CandidateSet;

/// Refinement results for one protein.
///
/// # Examples
///
/// ```rust,no_run
/// use trsift_core::config::{OutputFormat, PipelineConfig};
/// use trsift_core::detector::{NullModeller, TableDetector};
/// use trsift_core::output::write_results;
/// use trsift_core::pipeline::RepeatPipeline;
/// use trsift_core::types::ScoreModel;
///
/// let detector = TableDetector::from_path("denovo.tsv", &ScoreModel::default())?;
/// let pipeline = RepeatPipeline::new(PipelineConfig::default(), detector, NullModeller)?;
/// let batch = pipeline.analyze_fasta_file("proteins.fasta")?;
///
/// for result in batch.results.iter().filter(|r| r.has_repeats()) {
///     println!("{}: {} repeats", result.protein_id, result.repeats.len());
///     let mut output = std::fs::File::create(format!("{}.tsv", result.protein_id))?;
///     write_results(&mut output, result, OutputFormat::Tsv, &pipeline.config.score_model)?;
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatResults {
    /// Protein identifier, used as the output file stem
    pub protein_id: String,

    /// Final non-overlapping repeats, in detection order.
    ///
    /// Each entry is either the de novo candidate or the refined candidate
    /// that replaced it.
    pub repeats: CandidateSet,

    /// Candidate counts at each stage for this protein.
    pub counters: SequenceCounters,
}

impl RepeatResults {
    /// Whether anything survived filtering; proteins without repeats get no
    /// output file
    #[must_use]
    pub fn has_repeats(&self) -> bool {
        !self.repeats.is_empty()
    }
}

/// Candidate counts for one protein.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounters {
    /// Candidates reported by the detector
    pub raw: usize,
    /// Candidates left after all threshold filters
    pub filtered: usize,
    /// Candidates left after overlap clustering
    pub clustered: usize,
    /// Candidates replaced by their refined version
    pub refined: usize,
    /// Candidates kept unrefined because the refined hit was missing,
    /// unrelated or not significant
    pub kept_original: usize,
    /// Candidates kept unrefined because modelling or rescanning failed
    pub refinement_errors: usize,
}

/// Totals over a batch of proteins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Proteins that ran through the whole pipeline
    pub sequences_processed: usize,
    /// Proteins skipped after a detector failure
    pub sequences_skipped: usize,
    /// Processed proteins with at least one final repeat
    pub sequences_with_repeats: usize,
    /// Summed candidate counts of the processed proteins
    pub candidates: SequenceCounters,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} proteins ({} skipped, {} with repeats).",
            self.sequences_processed, self.sequences_skipped, self.sequences_with_repeats
        )?;
        writeln!(
            f,
            "There were {} repeats found de novo; {} passed the filters and {} remained after clustering.",
            self.candidates.raw, self.candidates.filtered, self.candidates.clustered
        )?;
        write!(
            f,
            "Refinement: {} refined, {} rejected, {} failed.",
            self.candidates.refined, self.candidates.kept_original, self.candidates.refinement_errors
        )
    }
}

/// Results of a batch run, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    /// One entry per processed protein, including proteins without repeats
    pub results: Vec<RepeatResults>,
    /// Identifiers of skipped proteins with the reason they were skipped
    pub skipped: Vec<(String, String)>,
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let summary = BatchSummary {
            sequences_processed: 2,
            sequences_skipped: 1,
            sequences_with_repeats: 1,
            candidates: SequenceCounters {
                raw: 5,
                filtered: 3,
                clustered: 2,
                refined: 1,
                kept_original: 1,
                refinement_errors: 0,
            },
        };
        let text = summary.to_string();
        assert!(text.contains("Processed 2 proteins (1 skipped, 1 with repeats)."));
        assert!(text.contains("There were 5 repeats found de novo"));
        assert!(text.ends_with("Refinement: 1 refined, 1 rejected, 0 failed."));
    }

    #[test]
    fn test_has_repeats() {
        let result = RepeatResults {
            protein_id: "P1".to_string(),
            repeats: CandidateSet::new(),
            counters: SequenceCounters::default(),
        };
        assert!(!result.has_repeats());
    }
}
