//! Detector and modeller adapters that run external programs.
//!
//! Commands are given as a program followed by whitespace-separated
//! arguments. Each call spawns a fresh child process, so no tool state
//! survives between proteins. Every call is bounded by a timeout; a child
//! that exceeds it is killed and the call fails with
//! [`ExternalError::Timeout`].
//!
//! ## Protocol
//!
//! - Detector: protein FASTA on stdin, candidate table on stdout
//! - Model build: `{msa}` and `{model}` placeholders are replaced by the path
//!   of a FASTA file holding the aligned units and the path the model must
//!   be written to
//! - Rescan: `{model}` placeholder, protein FASTA on stdin, candidate table
//!   on stdout; the first row is the hit

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use bio::io::fasta;
use log::debug;
use tempfile::{NamedTempFile, TempPath};

use crate::constants::{DEFAULT_PROFILE_MODEL, EXTERNAL_POLL_INTERVAL_MS};
use crate::detector::{Detector, ExternalError, ProfileModeller};
use crate::output::read_candidate_table;
use crate::sequence::write_fasta;
use crate::types::{Candidate, CandidateSet, ScoreModel, Sequence, TrsiftError};

const MSA_PLACEHOLDER: &str = "{msa}";
const MODEL_PLACEHOLDER: &str = "{model}";

/// Program and argument template of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a command line on whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TrsiftError::InvalidConfiguration`] for an empty command.
    pub fn parse(command_line: &str) -> Result<Self, TrsiftError> {
        let mut words = command_line.split_whitespace();
        let program = words.next().ok_or_else(|| {
            TrsiftError::InvalidConfiguration("external command is empty".to_string())
        })?;
        Ok(Self::new(program, words))
    }

    /// Arguments with every `(placeholder, value)` pair substituted
    fn render(&self, substitutions: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                substitutions
                    .iter()
                    .fold(arg.clone(), |arg, (key, value)| arg.replace(key, value))
            })
            .collect()
    }

    fn run(
        &self,
        args: &[String],
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<String, ExternalError> {
        run_tool(&self.program, args, stdin, timeout)
    }
}

/// Runs `program` to completion and returns its standard output.
///
/// `stdin` is written to the child on a separate thread while stdout and
/// stderr are drained, so large inputs and outputs cannot deadlock. On Unix
/// the child leads its own process group and the whole group is killed on
/// timeout. Output still held open by an escaped descendant is abandoned at
/// the deadline.
///
/// # Errors
///
/// - [`ExternalError::Io`] if the program cannot be started
/// - [`ExternalError::Timeout`] if it runs longer than `timeout`
/// - [`ExternalError::Failed`] if it exits unsuccessfully
/// - [`ExternalError::Output`] if stdout is not UTF-8
pub fn run_tool(
    program: &str,
    args: &[String],
    stdin: &[u8],
    timeout: Duration,
) -> Result<String, ExternalError> {
    let io_error = |source: std::io::Error| ExternalError::Io {
        tool: program.to_string(),
        source,
    };
    let timed_out = || ExternalError::Timeout {
        tool: program.to_string(),
        seconds: timeout.as_secs(),
    };

    debug!("Running {program} {}", args.join(" "));
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut command, 0);
    let mut child = command.spawn().map_err(io_error)?;
    let deadline = Instant::now() + timeout;

    if let Some(mut pipe) = child.stdin.take() {
        let input = stdin.to_vec();
        thread::spawn(move || {
            // The tool may exit without reading its input.
            let _ = pipe.write_all(&input);
        });
    }
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill_tree(&mut child);
                return Err(timed_out());
            }
            Ok(None) => thread::sleep(Duration::from_millis(EXTERNAL_POLL_INTERVAL_MS)),
            Err(source) => {
                kill_tree(&mut child);
                return Err(io_error(source));
            }
        }
    };

    let remaining = || deadline.saturating_duration_since(Instant::now());
    let Ok(stdout) = stdout.recv_timeout(remaining()) else {
        kill_tree(&mut child);
        return Err(timed_out());
    };
    let stderr = stderr.recv_timeout(remaining()).unwrap_or_default();

    if !status.success() {
        return Err(ExternalError::Failed {
            tool: program.to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    String::from_utf8(stdout).map_err(|e| ExternalError::Output {
        tool: program.to_string(),
        reason: e.to_string(),
    })
}

/// Reads a pipe to the end on a detached thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        let _ = sender.send(buffer);
    });
    receiver
}

/// Kills the child and, on Unix, every process left in its group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let _ = Command::new("kill")
            .args(["-s", "KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn fasta_input(tool: &str, sequence: &Sequence) -> Result<Vec<u8>, ExternalError> {
    write_fasta(sequence).map_err(|e| ExternalError::Output {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn parse_table(tool: &str, stdout: &str, model: &ScoreModel) -> Result<CandidateSet, ExternalError> {
    read_candidate_table(stdout.as_bytes(), model).map_err(|e| ExternalError::Output {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// De novo detector that runs an external program per protein.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    command: CommandSpec,
    model: ScoreModel,
    timeout: Duration,
}

impl CommandDetector {
    /// Scores printed by the program are stored under `model`.
    #[must_use]
    pub const fn new(command: CommandSpec, model: ScoreModel, timeout: Duration) -> Self {
        Self {
            command,
            model,
            timeout,
        }
    }
}

impl Detector for CommandDetector {
    fn detect(&self, sequence: &Sequence) -> Result<CandidateSet, ExternalError> {
        let program = &self.command.program;
        let input = fasta_input(program, sequence)?;
        let stdout = self.command.run(&self.command.args, &input, self.timeout)?;
        parse_table(program, &stdout, &self.model)
    }
}

/// Profile modeller that builds and rescans with external programs.
///
/// Models live in temporary files that are removed once the refinement of
/// their candidate is finished.
#[derive(Debug, Clone)]
pub struct CommandModeller {
    build: CommandSpec,
    rescan: CommandSpec,
    model: ScoreModel,
    name: String,
    timeout: Duration,
}

impl CommandModeller {
    #[must_use]
    pub fn new(
        build: CommandSpec,
        rescan: CommandSpec,
        model: ScoreModel,
        timeout: Duration,
    ) -> Self {
        Self {
            build,
            rescan,
            model,
            name: DEFAULT_PROFILE_MODEL.to_string(),
            timeout,
        }
    }

    /// Label refined candidates with `name` instead of `cpHMM`
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn io_error(&self, source: std::io::Error) -> ExternalError {
        ExternalError::Io {
            tool: self.build.program.clone(),
            source,
        }
    }

    /// Aligned units as FASTA, one record per unit
    fn write_alignment(&self, candidate: &Candidate) -> Result<NamedTempFile, ExternalError> {
        let mut file = tempfile::Builder::new()
            .prefix("trsift-msa-")
            .suffix(".fasta")
            .tempfile()
            .map_err(|e| self.io_error(e))?;
        {
            let mut writer = fasta::Writer::new(file.as_file_mut());
            for (index, unit) in candidate.period_alignment.iter().enumerate() {
                writer
                    .write(&format!("unit_{}", index + 1), None, unit.as_bytes())
                    .map_err(|e| self.io_error(e))?;
            }
            writer.flush().map_err(|e| self.io_error(e))?;
        }
        Ok(file)
    }
}

impl ProfileModeller for CommandModeller {
    type Model = TempPath;

    fn model_name(&self) -> &str {
        &self.name
    }

    fn build_model(&self, candidate: &Candidate) -> Result<Self::Model, ExternalError> {
        let alignment = self.write_alignment(candidate)?;
        let model = tempfile::Builder::new()
            .prefix("trsift-model-")
            .tempfile()
            .map_err(|e| self.io_error(e))?
            .into_temp_path();

        let msa_path = alignment.path().to_string_lossy();
        let model_path = model.to_string_lossy();
        let args = self.build.render(&[
            (MSA_PLACEHOLDER, msa_path.as_ref()),
            (MODEL_PLACEHOLDER, model_path.as_ref()),
        ]);
        self.build.run(&args, &[], self.timeout)?;
        Ok(model)
    }

    fn rescan(
        &self,
        sequence: &Sequence,
        model: &Self::Model,
    ) -> Result<Option<Candidate>, ExternalError> {
        let program = &self.rescan.program;
        let model_path = model.to_string_lossy();
        let args = self
            .rescan
            .render(&[(MODEL_PLACEHOLDER, model_path.as_ref())]);
        let input = fasta_input(program, sequence)?;
        let stdout = self.rescan.run(&args, &input, self.timeout)?;
        Ok(parse_table(program, &stdout, &self.model)?
            .into_iter()
            .next())
    }
}
