use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DIVERGENCE_THRESHOLD, DEFAULT_EXTERNAL_TIMEOUT_SECS, DEFAULT_N_EFFECTIVE_THRESHOLD,
    DEFAULT_PVALUE_THRESHOLD, MAX_THREADS,
};
use crate::filter::{Comparison, FilterSpec};
use crate::types::{ScoreModel, TrsiftError};

/// Output format options for per-protein repeat files.
///
/// # Examples
///
/// ```rust
/// use trsift_core::config::OutputFormat;
///
/// let format: OutputFormat = "json".parse()?;
/// assert_eq!(format, OutputFormat::Json);
/// assert_eq!(format.extension(), "json");
/// # Ok::<(), trsift_core::types::TrsiftError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tab-separated table, one repeat per row.
    ///
    /// Columns: `begin`, `msa_original`, `l_effective`, `n_effective`,
    /// `repeat_region_length`, `divergence`, `pvalue`. These files can be
    /// merged into one table with [`crate::merge`].
    #[default]
    Tsv,

    /// JSON document holding the protein identifier and full repeat records,
    /// including scores under every model, provenance and source model.
    Json,
}

impl OutputFormat {
    /// File extension used for per-protein files
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Tsv => "tsv",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TrsiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tsv" => Ok(Self::Tsv),
            "json" => Ok(Self::Json),
            other => Err(TrsiftError::InvalidConfiguration(format!(
                "unknown output format '{other}' (expected tsv or json)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Thresholds a candidate must meet to survive filtering.
///
/// The same p-value, divergence and copy number thresholds are applied a
/// second time to refined candidates before they may replace the original.
///
/// # Examples
///
/// ```rust
/// use trsift_core::config::FilterThresholds;
///
/// let strict = FilterThresholds {
///     pvalue: 0.01,
///     l_effective_max: Some(3.0),
///     ..Default::default()
/// };
/// assert_eq!(strict.pipeline_filters().len(), 4);
/// assert_eq!(strict.refinement_filters().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilterThresholds {
    /// Maximum p-value.
    ///
    /// **Default**: `0.05`
    pub pvalue: f64,

    /// Maximum divergence between repeat units.
    ///
    /// **Default**: `0.1`
    pub divergence: f64,

    /// Minimum effective number of repeat units.
    ///
    /// **Default**: `2.5`
    pub n_effective_min: f64,

    /// Maximum effective unit length, when set.
    ///
    /// Only applied during the initial filtering, never to refined
    /// candidates.
    ///
    /// **Default**: `None`
    pub l_effective_max: Option<f64>,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            pvalue: DEFAULT_PVALUE_THRESHOLD,
            divergence: DEFAULT_DIVERGENCE_THRESHOLD,
            n_effective_min: DEFAULT_N_EFFECTIVE_THRESHOLD,
            l_effective_max: None,
        }
    }
}

impl FilterThresholds {
    /// Filters applied to raw detector output, in application order
    #[must_use]
    pub fn pipeline_filters(&self) -> Vec<FilterSpec> {
        let mut filters = self.refinement_filters();
        if let Some(max_length) = self.l_effective_max {
            filters.push(FilterSpec::l_effective(Comparison::Max, max_length));
        }
        filters
    }

    /// Filters a refined candidate has to pass to be accepted
    #[must_use]
    pub fn refinement_filters(&self) -> Vec<FilterSpec> {
        vec![
            FilterSpec::pvalue(self.pvalue),
            FilterSpec::divergence(self.divergence),
            FilterSpec::n_effective(Comparison::Min, self.n_effective_min),
        ]
    }
}

/// Configuration settings for a repeat refinement run.
///
/// # Examples
///
/// ## Default configuration
///
/// ```rust
/// use trsift_core::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert!(config.validate().is_ok());
/// ```
///
/// ## Parallel run with a unit length cap
///
/// ```rust
/// use trsift_core::config::{FilterThresholds, PipelineConfig};
///
/// let config = PipelineConfig {
///     num_threads: 4,
///     thresholds: FilterThresholds {
///         l_effective_max: Some(3.0),
///         ..Default::default()
///     },
///     quiet: true,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Filter thresholds for raw and refined candidates.
    pub thresholds: FilterThresholds,

    /// Score model that p-values and divergences are read from.
    ///
    /// **Default**: `phylo_gap01`
    pub score_model: ScoreModel,

    /// Number of proteins processed concurrently (1 to 7).
    ///
    /// **Default**: `1`
    pub num_threads: usize,

    /// Format of per-protein output files.
    ///
    /// **Default**: [`OutputFormat::Tsv`]
    pub output_format: OutputFormat,

    /// Suppress per-protein progress output.
    ///
    /// **Default**: `false`
    pub quiet: bool,

    /// Time limit for a single external detector or modeller call.
    ///
    /// **Default**: 600 seconds
    pub external_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: FilterThresholds::default(),
            score_model: ScoreModel::default(),
            num_threads: 1,
            output_format: OutputFormat::Tsv,
            quiet: false,
            external_timeout: Duration::from_secs(DEFAULT_EXTERNAL_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    /// Rejects settings that cannot be run, before any protein is touched.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidConfiguration`] for a thread count
    /// outside `1..=7`, a zero timeout, or a non-finite threshold.
    pub fn validate(&self) -> Result<(), TrsiftError> {
        if !(1..=MAX_THREADS).contains(&self.num_threads) {
            return Err(TrsiftError::InvalidConfiguration(format!(
                "thread count {} outside 1..={MAX_THREADS}",
                self.num_threads
            )));
        }
        if self.external_timeout.is_zero() {
            return Err(TrsiftError::InvalidConfiguration(
                "external tool timeout must be positive".to_string(),
            ));
        }
        for spec in self.thresholds.pipeline_filters() {
            spec.validate()?;
        }
        Ok(())
    }
}
