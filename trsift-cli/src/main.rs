//! # trsift CLI - Tandem Repeat Refinement
//!
//! A command-line interface for filtering, clustering and refining de novo
//! tandem repeat predictions in protein sequences.
//!
//! ## Usage
//!
//! ```bash
//! # Refine precomputed candidates, one TSV per protein with repeats
//! trsift run --fasta proteins.fasta --candidates denovo.tsv --outdir results
//!
//! # Run a detector and profile-model tools per protein, then merge
//! trsift run --fasta proteins.fasta --outdir results \
//!     --detect-cmd "tral_detect --threads 1" \
//!     --build-cmd "hmmbuild {model} {msa}" \
//!     --rescan-cmd "tral_rescan {model}" --merge
//!
//! # Merge per-protein tables and drop duplicate rows
//! trsift merge --dir results
//! trsift dedup --file results/merged.tsv --overwrite
//! ```
//!
//! ## Commands
//!
//! - `run`: process a FASTA file (`--fasta`, `--outdir`, `--candidates` or
//!   `--detect-cmd`, optional `--build-cmd`/`--rescan-cmd`, `--threads`,
//!   `--format`, `--pvalue`, `--divergence`, `--n-effective`,
//!   `--l-effective`, `--score-model`, `--timeout`, `--merge`)
//! - `merge`: concatenate per-protein tables (`--dir`, `--output`)
//! - `dedup`: remove repeated `(ID, begin)` rows (`--file`, `--output` or
//!   `--overwrite`)
//!
//! `-q, --quiet` suppresses progress logging and the final summary.

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command, value_parser};
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use trsift_core::RepeatPipeline;
use trsift_core::config::{FilterThresholds, OutputFormat, PipelineConfig};
use trsift_core::constants::{
    DEFAULT_DIVERGENCE_THRESHOLD, DEFAULT_EXTERNAL_TIMEOUT_SECS, DEFAULT_L_EFFECTIVE_THRESHOLD,
    DEFAULT_N_EFFECTIVE_THRESHOLD, DEFAULT_PVALUE_THRESHOLD, DEFAULT_SCORE_MODEL,
};
use trsift_core::detector::{Detector, NullModeller, ProfileModeller, TableDetector};
use trsift_core::external::{CommandDetector, CommandModeller, CommandSpec};
use trsift_core::merge::{deduplicate_file, list_result_files, merge_directory, merge_result_files};
use trsift_core::output::write_results;
use trsift_core::types::{ScoreModel, TrsiftError};

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn cli() -> Command {
    Command::new("trsift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Tandem repeat refinement for protein sequences")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Quiet mode"),
        )
        .subcommand(run_command())
        .subcommand(
            Command::new("merge")
                .about("Merge per-protein result tables into one table")
                .arg(
                    Arg::new("dir")
                        .short('d')
                        .long("dir")
                        .value_name("DIR")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory holding the per-protein .tsv files"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Merged table (default: DIR/merged.tsv)"),
                ),
        )
        .subcommand(
            Command::new("dedup")
                .about("Remove rows repeating an (ID, begin) pair from a merged table")
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Merged table"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the deduplicated table here"),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Replace the input file"),
                )
                .group(
                    ArgGroup::new("destination")
                        .args(["output", "overwrite"])
                        .required(true),
                ),
        )
}

fn run_command() -> Command {
    Command::new("run")
        .about("Filter, cluster and refine the repeats of every protein in a FASTA file")
        .arg(
            Arg::new("fasta")
                .short('i')
                .long("fasta")
                .value_name("FILE")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Input protein FASTA file"),
        )
        .arg(
            Arg::new("outdir")
                .short('o')
                .long("outdir")
                .value_name("DIR")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory for per-protein result files"),
        )
        .arg(
            Arg::new("candidates")
                .short('c')
                .long("candidates")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Precomputed candidates as a merged table with an ID column"),
        )
        .arg(
            Arg::new("detect-cmd")
                .long("detect-cmd")
                .value_name("COMMAND")
                .help("De novo detector: FASTA on stdin, candidate table on stdout"),
        )
        .group(
            ArgGroup::new("detector")
                .args(["candidates", "detect-cmd"])
                .required(true),
        )
        .arg(
            Arg::new("build-cmd")
                .long("build-cmd")
                .value_name("COMMAND")
                .requires("rescan-cmd")
                .help("Profile model builder, given {msa} and {model} paths"),
        )
        .arg(
            Arg::new("rescan-cmd")
                .long("rescan-cmd")
                .value_name("COMMAND")
                .requires("build-cmd")
                .help("Profile model scanner, given {model}; FASTA on stdin"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Proteins processed concurrently (1-7)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .default_value("tsv")
                .help("Output format: tsv, json"),
        )
        .arg(threshold_arg("pvalue", "Maximum p-value (default: 0.05)"))
        .arg(threshold_arg("divergence", "Maximum divergence (default: 0.1)"))
        .arg(threshold_arg(
            "n-effective",
            "Minimum effective number of units (default: 2.5)",
        ))
        .arg(
            Arg::new("l-effective")
                .long("l-effective")
                .value_name("MAX")
                .num_args(0..=1)
                .value_parser(value_parser!(f64))
                .help("Maximum effective unit length; 3 when given without a value (default: no limit)"),
        )
        .arg(
            Arg::new("score-model")
                .long("score-model")
                .value_name("MODEL")
                .default_value(DEFAULT_SCORE_MODEL)
                .help("Score model that p-values and divergences are read from"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .help("Time limit for one external tool call (default: 600)"),
        )
        .arg(
            Arg::new("merge")
                .short('m')
                .long("merge")
                .action(ArgAction::SetTrue)
                .help("Merge the per-protein tables into OUTDIR/merged.tsv"),
        )
}

fn threshold_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("X")
        .value_parser(value_parser!(f64))
        .help(help)
}

/// Main entry point for the trsift CLI application.
fn main() -> CliResult {
    let matches = cli().get_matches();
    let quiet = matches.get_flag("quiet");

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if quiet { "warn" } else { "info" }),
    )
    .init();

    match matches.subcommand() {
        Some(("run", args)) => run(args, quiet),
        Some(("merge", args)) => merge(args, quiet),
        Some(("dedup", args)) => dedup(args, quiet),
        _ => Err("Unknown command".into()),
    }
}

fn pipeline_config(args: &ArgMatches, quiet: bool) -> Result<PipelineConfig, TrsiftError> {
    let threshold = |name: &str, default: f64| args.get_one::<f64>(name).copied().unwrap_or(default);
    let format: OutputFormat = args
        .get_one::<String>("format")
        .map_or(Ok(OutputFormat::default()), |format| format.parse())?;

    let config = PipelineConfig {
        thresholds: FilterThresholds {
            pvalue: threshold("pvalue", DEFAULT_PVALUE_THRESHOLD),
            divergence: threshold("divergence", DEFAULT_DIVERGENCE_THRESHOLD),
            n_effective_min: threshold("n-effective", DEFAULT_N_EFFECTIVE_THRESHOLD),
            l_effective_max: args.contains_id("l-effective").then(|| {
                threshold("l-effective", DEFAULT_L_EFFECTIVE_THRESHOLD)
            }),
        },
        score_model: args
            .get_one::<String>("score-model")
            .map(ScoreModel::new)
            .unwrap_or_default(),
        num_threads: args.get_one::<usize>("threads").copied().unwrap_or(1),
        output_format: format,
        quiet,
        external_timeout: Duration::from_secs(
            args.get_one::<u64>("timeout")
                .copied()
                .unwrap_or(DEFAULT_EXTERNAL_TIMEOUT_SECS),
        ),
    };
    config.validate()?;

    if args.get_flag("merge") && config.output_format != OutputFormat::Tsv {
        return Err(TrsiftError::InvalidConfiguration(
            "--merge requires tsv output".to_string(),
        ));
    }
    Ok(config)
}

fn run(args: &ArgMatches, quiet: bool) -> CliResult {
    let config = pipeline_config(args, quiet)?;

    if let Some(table) = args.get_one::<PathBuf>("candidates") {
        let detector = TableDetector::from_path(table, &config.score_model)?;
        info!(
            "Loaded candidates for {} proteins from {}",
            detector.protein_count(),
            table.display()
        );
        run_with_detector(args, config, detector)
    } else if let Some(command) = args.get_one::<String>("detect-cmd") {
        let detector = CommandDetector::new(
            CommandSpec::parse(command)?,
            config.score_model.clone(),
            config.external_timeout,
        );
        run_with_detector(args, config, detector)
    } else {
        Err("either --candidates or --detect-cmd is required".into())
    }
}

fn run_with_detector<D: Detector>(args: &ArgMatches, config: PipelineConfig, detector: D) -> CliResult {
    let build = args.get_one::<String>("build-cmd");
    let rescan = args.get_one::<String>("rescan-cmd");

    match (build, rescan) {
        (Some(build), Some(rescan)) => {
            let modeller = CommandModeller::new(
                CommandSpec::parse(build)?,
                CommandSpec::parse(rescan)?,
                config.score_model.clone(),
                config.external_timeout,
            );
            execute(args, RepeatPipeline::new(config, detector, modeller)?)
        }
        _ => execute(args, RepeatPipeline::new(config, detector, NullModeller)?),
    }
}

fn execute<D: Detector, M: ProfileModeller>(
    args: &ArgMatches,
    pipeline: RepeatPipeline<D, M>,
) -> CliResult {
    let fasta = args
        .get_one::<PathBuf>("fasta")
        .ok_or("--fasta is required")?;
    let outdir = args
        .get_one::<PathBuf>("outdir")
        .ok_or("--outdir is required")?;
    let config = &pipeline.config;

    fs::create_dir_all(outdir)?;
    let batch = pipeline.analyze_fasta_file(fasta)?;

    for result in batch.results.iter().filter(|result| result.has_repeats()) {
        let path = outdir.join(format!(
            "{}.{}",
            result.protein_id,
            config.output_format.extension()
        ));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_results(&mut writer, result, config.output_format, &config.score_model)?;
        writer.flush()?;
    }

    if args.get_flag("merge") {
        match merge_directory(outdir) {
            Ok(report) => info!("Merged table written to {}", report.output.display()),
            Err(TrsiftError::NoInputFiles(_)) => info!("No repeats found, nothing to merge"),
            Err(e) => return Err(e.into()),
        }
    }

    if !config.quiet {
        eprintln!("{}", batch.summary);
    }
    Ok(())
}

fn merge(args: &ArgMatches, quiet: bool) -> CliResult {
    let dir = args.get_one::<PathBuf>("dir").ok_or("--dir is required")?;

    let report = match args.get_one::<PathBuf>("output") {
        Some(output) => {
            let files = list_result_files(dir)?;
            if files.is_empty() {
                return Err(TrsiftError::NoInputFiles(dir.clone()).into());
            }
            merge_result_files(&files, output)?
        }
        None => merge_directory(dir)?,
    };

    if !quiet {
        eprintln!(
            "Merged {} rows from {} files into {}",
            report.rows,
            report.files,
            report.output.display()
        );
    }
    Ok(())
}

fn dedup(args: &ArgMatches, quiet: bool) -> CliResult {
    let file = args.get_one::<PathBuf>("file").ok_or("--file is required")?;
    let output = args.get_one::<PathBuf>("output").map(PathBuf::as_path);

    let report = deduplicate_file(file, output)?;
    if !quiet {
        eprintln!(
            "Removed {} duplicate rows; {} rows written to {}",
            report.duplicates,
            report.kept,
            display_name(&report.output)
        );
    }
    Ok(())
}

/// File name of `path`, falling back to the full path
fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}
