// =============================================================================
// Scoring
// =============================================================================

/// Score model that p-values and divergences are read from by default
pub const DEFAULT_SCORE_MODEL: &str = "phylo_gap01";

/// Label recorded as the source model of refined candidates
pub const DEFAULT_PROFILE_MODEL: &str = "cpHMM";

/// Gap symbol used in repeat unit alignments
pub const GAP_CHARACTER: u8 = b'-';

// =============================================================================
// Filter thresholds
// =============================================================================

/// Maximum p-value for a candidate to be kept
pub const DEFAULT_PVALUE_THRESHOLD: f64 = 0.05;

/// Maximum divergence between repeat units for a candidate to be kept
pub const DEFAULT_DIVERGENCE_THRESHOLD: f64 = 0.1;

/// Minimum effective number of repeat units for a candidate to be kept
pub const DEFAULT_N_EFFECTIVE_THRESHOLD: f64 = 2.5;

/// Maximum effective unit length when the optional unit length filter is on
pub const DEFAULT_L_EFFECTIVE_THRESHOLD: f64 = 3.0;

// =============================================================================
// Execution
// =============================================================================

/// Upper bound on worker threads for a batch
pub const MAX_THREADS: usize = 7;

/// Seconds an external detector or modeller call may run before it is killed
pub const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 600;

/// Interval between checks on a running external tool
pub const EXTERNAL_POLL_INTERVAL_MS: u64 = 20;

// =============================================================================
// Result files
// =============================================================================

/// Column names of a per-protein result file
pub const RESULT_COLUMNS: [&str; 7] = [
    "begin",
    "msa_original",
    "l_effective",
    "n_effective",
    "repeat_region_length",
    "divergence",
    "pvalue",
];

/// Column prepended to merged result files
pub const ID_COLUMN: &str = "ID";

/// File name of the merged result file inside a result directory
pub const MERGED_FILE_NAME: &str = "merged.tsv";
