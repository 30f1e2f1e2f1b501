//! Output formatting for repeat refinement results.
//!
//! This module writes [`RepeatResults`] to per-protein files and reads the
//! same tabular layout back in.
//!
//! ## Supported Formats
//!
//! - **TSV**: `begin`, `msa_original`, `l_effective`, `n_effective`,
//!   `repeat_region_length`, `divergence`, `pvalue`
//! - **JSON**: protein id and complete repeat records
//!
//! ## Examples
//!
//! ### Write results to a file
//!
//! ```rust,no_run
//! use trsift_core::config::{OutputFormat, PipelineConfig};
//! use trsift_core::detector::{NullModeller, TableDetector};
//! use trsift_core::output::write_results;
//! use trsift_core::pipeline::RepeatPipeline;
//! use trsift_core::types::{ScoreModel, Sequence};
//! use std::fs::File;
//!
//! let model = ScoreModel::default();
//! let detector = TableDetector::from_path("denovo.tsv", &model)?;
//! let pipeline = RepeatPipeline::new(PipelineConfig::default(), detector, NullModeller)?;
//! let results = pipeline.analyze_sequence(&Sequence::new("P04637", "MEEPQSDPSV"))?;
//!
//! let mut tsv_file = File::create("P04637.tsv")?;
//! write_results(&mut tsv_file, &results, OutputFormat::Tsv, &model)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Read a result table back
//!
//! ```rust
//! use trsift_core::output::read_candidate_table;
//! use trsift_core::types::ScoreModel;
//!
//! let table = "begin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\tdivergence\tpvalue\n\
//!              12\tGGS,GGS,GGS\t3.0\t3.0\t9\t0.0\t0.0001\n";
//! let set = read_candidate_table(table.as_bytes(), &ScoreModel::default())?;
//! assert_eq!(set.get(0).unwrap().region_length, 9);
//! # Ok::<(), trsift_core::types::TrsiftError>(())
//! ```

use crate::{
    TrsiftError, config::OutputFormat, results::RepeatResults, types::ScoreModel,
};
use std::io::Write;

mod formats {
    pub mod json;
    pub mod tsv;
}

pub use formats::tsv::{format_decimal, read_candidate_table, read_merged_table};
use formats::{json::write_json_format, tsv::write_tsv_format};

/// Writes the final repeats of one protein in the specified format.
///
/// Scores in the TSV layout are taken from `model`; the JSON layout carries
/// every score the candidates have.
///
/// # Errors
///
/// Returns [`TrsiftError`] if writing fails.
pub fn write_results<W: Write>(
    writer: &mut W,
    results: &RepeatResults,
    format: OutputFormat,
    model: &ScoreModel,
) -> Result<(), TrsiftError> {
    match format {
        OutputFormat::Tsv => write_tsv_format(writer, results, model),
        OutputFormat::Json => write_json_format(writer, results),
    }
}
