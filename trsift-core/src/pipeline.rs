//! Per-protein filter, cluster and refine pipeline.
//!
//! [`RepeatPipeline`] ties a [`Detector`] and a [`ProfileModeller`] to a
//! validated [`PipelineConfig`]. Every protein runs through the same strictly
//! sequential stages:
//!
//! 1. **Detect**: raw candidates from the detector
//! 2. **Filter**: pvalue, divergence, minimum `n_effective` and the optional
//!    maximum `l_effective`
//! 3. **Cluster**: one winner per group of overlapping candidates
//! 4. **Refine**: each winner independently, see [`crate::refine`]
//!
//! Proteins are independent of each other, so batches are spread over a
//! thread pool. A protein whose detection fails is logged and skipped
//! without stopping the batch.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::cluster::{OverlapRule, TieBreak, cluster};
use crate::config::PipelineConfig;
use crate::detector::{Detector, ProfileModeller};
use crate::filter::apply_filters;
use crate::refine::Refiner;
use crate::results::{BatchResults, BatchSummary, RepeatResults, SequenceCounters};
use crate::sequence::read_fasta_sequences;
use crate::types::{CandidateSet, Sequence, TrsiftError};

/// Repeat refinement pipeline over one detector and one modeller.
///
/// # Examples
///
/// ```rust
/// use trsift_core::config::PipelineConfig;
/// use trsift_core::detector::{NullModeller, TableDetector};
/// use trsift_core::pipeline::RepeatPipeline;
/// use trsift_core::types::{ScoreModel, Sequence};
///
/// let table = "ID\tbegin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\tdivergence\tpvalue\n\
///              P1\t2\tPEL,PEL,PEL\t3\t3\t9\t0.01\t0.001\n\
///              P1\t4\tLPE,LPE,LPE\t3\t3\t9\t0.02\t0.01\n";
/// let detector = TableDetector::from_reader(table.as_bytes(), &ScoreModel::default())?;
/// let pipeline = RepeatPipeline::new(PipelineConfig::default(), detector, NullModeller)?;
///
/// let results = pipeline.analyze_sequence(&Sequence::new("P1", "MPELPELPELQ"))?;
/// assert_eq!(results.counters.raw, 2);
/// assert_eq!(results.repeats.len(), 1);
/// assert_eq!(results.repeats.get(0).unwrap().begin, 2);
/// # Ok::<(), trsift_core::types::TrsiftError>(())
/// ```
#[derive(Debug)]
pub struct RepeatPipeline<D: Detector, M: ProfileModeller> {
    /// Settings the pipeline was validated against
    pub config: PipelineConfig,
    detector: D,
    modeller: M,
}

impl<D: Detector, M: ProfileModeller> RepeatPipeline<D, M> {
    /// Creates a pipeline after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidConfiguration`] if the configuration
    /// cannot be run; nothing has been processed at that point.
    pub fn new(config: PipelineConfig, detector: D, modeller: M) -> Result<Self, TrsiftError> {
        config.validate()?;
        Ok(Self {
            config,
            detector,
            modeller,
        })
    }

    /// Filters, clusters and refines the raw candidates of one protein.
    ///
    /// # Arguments
    ///
    /// * `sequence` - Protein the candidates were detected in
    /// * `raw` - Detector output, in detection order
    ///
    /// # Returns
    ///
    /// The final non-overlapping candidates and the per-stage counts.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidConfiguration`] if a filter cannot be
    /// applied.
    pub fn run(
        &self,
        sequence: &Sequence,
        raw: &CandidateSet,
    ) -> Result<(CandidateSet, SequenceCounters), TrsiftError> {
        let model = &self.config.score_model;

        let filtered = apply_filters(raw, &self.config.thresholds.pipeline_filters(), model)?;
        let clustered = cluster(
            &filtered,
            OverlapRule::SharedPosition,
            &TieBreak::by_significance(model.clone()),
        );

        let refiner = Refiner::new(&self.modeller, &self.config.thresholds, model.clone());
        let (refined, tally) = refiner.refine_all(sequence, &clustered);

        let counters = SequenceCounters {
            raw: raw.len(),
            filtered: filtered.len(),
            clustered: clustered.len(),
            refined: tally.refined,
            kept_original: tally.kept_original,
            refinement_errors: tally.errors,
        };
        Ok((refined, counters))
    }

    /// Detects and processes the repeats of one protein.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::External`] if the detector fails for this
    /// protein.
    pub fn analyze_sequence(&self, sequence: &Sequence) -> Result<RepeatResults, TrsiftError> {
        let raw = self.detector.detect(sequence)?;
        let (repeats, counters) = self.run(sequence, &raw)?;

        if !self.config.quiet {
            info!(
                "{}: {} raw, {} after filtering, {} final ({} refined)",
                sequence.id,
                counters.raw,
                counters.filtered,
                repeats.len(),
                counters.refined
            );
        }

        Ok(RepeatResults {
            protein_id: sequence.id.clone(),
            repeats,
            counters,
        })
    }

    /// Processes a batch of proteins on a pool of `config.num_threads`
    /// workers.
    ///
    /// Results keep the order of `sequences`. Proteins whose analysis fails
    /// are listed in [`BatchResults::skipped`] and contribute nothing to the
    /// candidate counts.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidConfiguration`] if the thread pool
    /// cannot be created.
    pub fn analyze_batch(&self, sequences: &[Sequence]) -> Result<BatchResults, TrsiftError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| {
                TrsiftError::InvalidConfiguration(format!("Failed to configure thread pool: {e}"))
            })?;

        let counters = BatchCounters::default();
        let outcomes: Vec<Result<RepeatResults, (String, String)>> = pool.install(|| {
            sequences
                .par_iter()
                .map(|sequence| match self.analyze_sequence(sequence) {
                    Ok(result) => {
                        counters.record(&result);
                        Ok(result)
                    }
                    Err(error) => {
                        warn!("Skipping {}: {error}", sequence.id);
                        counters.record_skip();
                        Err((sequence.id.clone(), error.to_string()))
                    }
                })
                .collect()
        });

        let mut batch = BatchResults {
            summary: counters.summary(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(result) => batch.results.push(result),
                Err(skipped) => batch.skipped.push(skipped),
            }
        }
        debug!(
            "batch finished: {} processed, {} skipped",
            batch.summary.sequences_processed, batch.summary.sequences_skipped
        );
        Ok(batch)
    }

    /// Reads a protein FASTA file and processes every record.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError`] if the file cannot be read or parsed, or if
    /// the thread pool cannot be created.
    pub fn analyze_fasta_file<P: AsRef<Path>>(&self, path: P) -> Result<BatchResults, TrsiftError> {
        let sequences = read_fasta_sequences(path.as_ref())?;
        info!(
            "Read {} proteins from {}",
            sequences.len(),
            path.as_ref().display()
        );
        self.analyze_batch(&sequences)
    }
}

/// Running totals shared by the batch workers
#[derive(Debug, Default)]
struct BatchCounters {
    processed: AtomicUsize,
    skipped: AtomicUsize,
    with_repeats: AtomicUsize,
    raw: AtomicUsize,
    filtered: AtomicUsize,
    clustered: AtomicUsize,
    refined: AtomicUsize,
    kept_original: AtomicUsize,
    refinement_errors: AtomicUsize,
}

impl BatchCounters {
    fn record(&self, result: &RepeatResults) {
        let counts = &result.counters;
        self.processed.fetch_add(1, Ordering::Relaxed);
        if result.has_repeats() {
            self.with_repeats.fetch_add(1, Ordering::Relaxed);
        }
        self.raw.fetch_add(counts.raw, Ordering::Relaxed);
        self.filtered.fetch_add(counts.filtered, Ordering::Relaxed);
        self.clustered.fetch_add(counts.clustered, Ordering::Relaxed);
        self.refined.fetch_add(counts.refined, Ordering::Relaxed);
        self.kept_original
            .fetch_add(counts.kept_original, Ordering::Relaxed);
        self.refinement_errors
            .fetch_add(counts.refinement_errors, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self) -> BatchSummary {
        BatchSummary {
            sequences_processed: self.processed.load(Ordering::Relaxed),
            sequences_skipped: self.skipped.load(Ordering::Relaxed),
            sequences_with_repeats: self.with_repeats.load(Ordering::Relaxed),
            candidates: SequenceCounters {
                raw: self.raw.load(Ordering::Relaxed),
                filtered: self.filtered.load(Ordering::Relaxed),
                clustered: self.clustered.load(Ordering::Relaxed),
                refined: self.refined.load(Ordering::Relaxed),
                kept_original: self.kept_original.load(Ordering::Relaxed),
                refinement_errors: self.refinement_errors.load(Ordering::Relaxed),
            },
        }
    }
}
