//! # trsift - Tandem Repeat Refinement
//!
//! A library for turning raw de novo tandem repeat predictions in protein
//! sequences into a curated, non-overlapping set of significant repeats.
//!
//! ## Overview
//!
//! De novo detectors report many candidate repeats per protein, often
//! competing for the same residues and with weak statistical support. For
//! every protein this library:
//!
//! 1. drops candidates that fail the p-value, divergence and size thresholds
//! 2. keeps one winner per group of overlapping candidates
//! 3. tries to sharpen each winner with a profile model built from its own
//!    alignment, accepting the refined repeat only when it still describes
//!    the same region and passes the same thresholds
//!
//! Detection and model building are not part of this crate. They are reached
//! through the [`detector::Detector`] and [`detector::ProfileModeller`]
//! traits, with ready-made adapters for precomputed tables and external
//! programs.
//!
//! ## Features
//!
//! - **Explicit overlap graph**: clusters are connected components
//! - **Tagged refinement outcomes**: original, refined or skipped on error
//! - **Batch processing**: proteins processed in parallel using Rayon, with
//!   per-protein failures logged and skipped
//! - **Result tables**: per-protein TSV or JSON, plus merging and
//!   deduplication of TSV tables
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trsift_core::RepeatPipeline;
//! use trsift_core::config::PipelineConfig;
//! use trsift_core::detector::{NullModeller, TableDetector};
//! use trsift_core::types::ScoreModel;
//!
//! let detector = TableDetector::from_path("denovo.tsv", &ScoreModel::default())?;
//! let pipeline = RepeatPipeline::new(PipelineConfig::default(), detector, NullModeller)?;
//!
//! let batch = pipeline.analyze_fasta_file("proteins.fasta")?;
//! println!("{}", batch.summary);
//! # Ok::<(), trsift_core::types::TrsiftError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: Pipeline settings and filter thresholds
//! - [`types`]: Candidates, sequences and errors
//! - [`filter`]: Threshold predicates over candidates
//! - [`cluster`]: Overlap graph and winner selection
//! - [`refine`]: Profile-model refinement of single candidates
//! - [`pipeline`]: Per-protein and batch orchestration
//! - [`detector`]: Detector and modeller traits
//! - [`external`]: Adapters running external programs
//! - [`results`]: Per-protein results and batch summaries
//! - [`output`]: TSV and JSON result files
//! - [`merge`]: Merging and deduplicating result tables
//! - [`sequence`]: FASTA input
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, TrsiftError>`](types::TrsiftError).
//! Configuration errors are raised before any protein is processed;
//! failures of external tools are reported per protein as
//! [`detector::ExternalError`] and do not stop a batch.

pub mod cluster;
pub mod config;
pub mod constants;
pub mod detector;
pub mod external;
pub mod filter;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod refine;
pub mod results;
pub mod sequence;
pub mod types;

pub use pipeline::RepeatPipeline;
pub use types::TrsiftError;
