//! Combining per-protein result tables.
//!
//! A run leaves one `<protein>.tsv` per protein with repeats. [`merge_directory`]
//! concatenates them into a single table with a leading `ID` column taken
//! from each file name, and [`deduplicate_file`] drops rows of the merged
//! table that repeat an `(ID, begin)` pair.
//!
//! # Examples
//!
//! ```rust
//! use trsift_core::merge::deduplicate;
//!
//! let merged = "ID\tbegin\tmsa_original\n\
//!               P1\t10\tAB,AB\n\
//!               P1\t10\tAB,A-\n\
//!               P2\t10\tCD,CD\n";
//! let (lines, duplicates) = deduplicate(merged.as_bytes())?;
//! assert_eq!(duplicates, 1);
//! assert_eq!(lines.len(), 3);
//! # Ok::<(), trsift_core::types::TrsiftError>(())
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::constants::{ID_COLUMN, MERGED_FILE_NAME, RESULT_COLUMNS};
use crate::types::TrsiftError;

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub files: usize,
    pub rows: usize,
    pub output: PathBuf,
}

/// Outcome of a deduplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupReport {
    /// Data rows left in the output
    pub kept: usize,
    /// Rows dropped as repeats of an earlier `(ID, begin)` pair
    pub duplicates: usize,
    pub output: PathBuf,
}

/// Per-protein result tables in `dir`, sorted by path.
///
/// Any previous merged table is left out.
///
/// # Errors
///
/// Returns [`TrsiftError::IoError`] if the directory cannot be listed.
pub fn list_result_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, TrsiftError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let is_table = path.extension().is_some_and(|ext| ext == "tsv");
        let is_merged = path
            .file_name()
            .is_some_and(|name| name == MERGED_FILE_NAME);
        if path.is_file() && is_table && !is_merged {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Protein id of a result file: its name without the `.tsv` extension.
///
/// Versioned accessions such as `NP_000537.3` keep their suffix, so merged
/// ids match the FASTA ids the tables were written for.
fn protein_id_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Concatenates `files` into `output`, prefixing every row with its
/// protein id.
///
/// Nothing is written unless every input has a header starting with
/// `begin`.
///
/// # Errors
///
/// Returns [`TrsiftError::HeaderMismatch`] for the first input with another
/// header, and [`TrsiftError::IoError`] if reading or writing fails.
pub fn merge_result_files<P: AsRef<Path>>(
    files: &[PathBuf],
    output: P,
) -> Result<MergeReport, TrsiftError> {
    let mut merged = String::new();
    let mut rows = 0;

    for path in files {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();
        let header = lines.next().transpose()?.unwrap_or_default();
        if !header.starts_with(RESULT_COLUMNS[0]) {
            return Err(TrsiftError::HeaderMismatch {
                path: path.clone(),
                found: header,
            });
        }
        if merged.is_empty() {
            let _ = writeln!(merged, "{ID_COLUMN}\t{}", header.trim_end());
        }

        let id = protein_id_of(path);
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let _ = writeln!(merged, "{id}\t{}", line.trim_end());
            rows += 1;
        }
        debug!("merged {}", path.display());
    }

    let output = output.as_ref().to_path_buf();
    fs::write(&output, merged)?;
    info!(
        "Merged {} rows from {} files into {}",
        rows,
        files.len(),
        output.display()
    );
    Ok(MergeReport {
        files: files.len(),
        rows,
        output,
    })
}

/// Merges every result table of `dir` into `dir/merged.tsv`.
///
/// # Errors
///
/// Returns [`TrsiftError::NoInputFiles`] if `dir` holds no result tables,
/// otherwise as [`merge_result_files`].
pub fn merge_directory<P: AsRef<Path>>(dir: P) -> Result<MergeReport, TrsiftError> {
    let dir = dir.as_ref();
    let files = list_result_files(dir)?;
    if files.is_empty() {
        return Err(TrsiftError::NoInputFiles(dir.to_path_buf()));
    }
    merge_result_files(&files, dir.join(MERGED_FILE_NAME))
}

/// Drops rows repeating the `(ID, begin)` pair of an earlier row.
///
/// The header line (starting with `ID`) is kept, as is the first row of
/// every pair. Blank lines are dropped.
///
/// # Returns
///
/// The lines to keep and the number of duplicates removed.
///
/// # Errors
///
/// Returns [`TrsiftError::IoError`] if reading fails.
pub fn deduplicate<R: BufRead>(reader: R) -> Result<(Vec<String>, usize), TrsiftError> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut kept = Vec::new();
    let mut duplicates = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(ID_COLUMN) {
            kept.push(line);
            continue;
        }

        let mut fields = line.split('\t');
        let id = fields.next().unwrap_or_default().to_string();
        let begin = fields.next().unwrap_or_default().to_string();
        if seen.insert((id, begin)) {
            kept.push(line);
        } else {
            duplicates += 1;
        }
    }
    Ok((kept, duplicates))
}

/// Deduplicates a merged table file.
///
/// Writes to `output` when given, otherwise replaces `input`. The result is
/// written to a temporary file first and moved into place.
///
/// # Errors
///
/// Returns [`TrsiftError::IoError`] if reading or writing fails.
pub fn deduplicate_file<P: AsRef<Path>>(
    input: P,
    output: Option<&Path>,
) -> Result<DedupReport, TrsiftError> {
    let input = input.as_ref();
    let (lines, duplicates) = deduplicate(BufReader::new(File::open(input)?))?;
    let output = output.unwrap_or(input).to_path_buf();

    let parent = output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(parent)?;
    for line in &lines {
        writeln!(staged, "{line}")?;
    }
    staged.persist(&output).map_err(|e| TrsiftError::IoError(e.error))?;

    let kept = lines
        .iter()
        .filter(|line| !line.starts_with(ID_COLUMN))
        .count();
    info!(
        "{duplicates} duplicate rows removed, {kept} rows written to {}",
        output.display()
    );
    Ok(DedupReport {
        kept,
        duplicates,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str =
        "begin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\tdivergence\tpvalue";

    fn write_table(dir: &Path, name: &str, rows: &[&str]) {
        let mut content = format!("{HEADER}\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_list_result_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write_table(dir.path(), "P2.tsv", &[]);
        write_table(dir.path(), "P1.tsv", &[]);
        write_table(dir.path(), MERGED_FILE_NAME, &[]);
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = list_result_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["P1.tsv", "P2.tsv"]);
    }

    #[test]
    fn test_merge_directory_prefixes_ids() {
        let dir = TempDir::new().unwrap();
        write_table(
            dir.path(),
            "P1.tsv",
            &["10\tAB,AB,AB\t2.0\t3.0\t6\t0.0\t0.001"],
        );
        write_table(
            dir.path(),
            "NP_000537.3.tsv",
            &["4\tCD,CD,CD\t2.0\t3.0\t6\t0.01\t0.002", "30\tEF,EF,EF\t2.0\t3.0\t6\t0.0\t0.01"],
        );

        let report = merge_directory(dir.path()).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.rows, 3);

        let merged = fs::read_to_string(dir.path().join(MERGED_FILE_NAME)).unwrap();
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines[0], format!("ID\t{HEADER}"));
        assert!(lines[1].starts_with("NP_000537.3\t4\t"));
        assert!(lines[2].starts_with("NP_000537.3\t30\t"));
        assert!(lines[3].starts_with("P1\t10\t"));
    }

    #[test]
    fn test_merge_directory_is_repeatable() {
        let dir = TempDir::new().unwrap();
        write_table(dir.path(), "P1.tsv", &["10\tAB,AB,AB\t2.0\t3.0\t6\t0.0\t0.001"]);

        merge_directory(dir.path()).unwrap();
        let second = merge_directory(dir.path()).unwrap();
        assert_eq!(second.files, 1);
        assert_eq!(second.rows, 1);
    }

    #[test]
    fn test_merge_rejects_bad_header() {
        let dir = TempDir::new().unwrap();
        write_table(dir.path(), "P1.tsv", &[]);
        fs::write(dir.path().join("P2.tsv"), "start\tend\n1\t2\n").unwrap();

        let err = merge_directory(dir.path()).unwrap_err();
        match err {
            TrsiftError::HeaderMismatch { path, found } => {
                assert!(path.ends_with("P2.tsv"));
                assert_eq!(found, "start\tend");
            }
            other => panic!("Expected HeaderMismatch, got {other:?}"),
        }
        assert!(!dir.path().join(MERGED_FILE_NAME).exists());
    }

    #[test]
    fn test_merge_empty_directory() {
        let dir = TempDir::new().unwrap();
        let result = merge_directory(dir.path());
        assert!(matches!(result, Err(TrsiftError::NoInputFiles(_))));
    }

    #[test]
    fn test_deduplicate_reports_single_duplicate() {
        let merged = format!(
            "ID\t{HEADER}\nP1\t10\tAB,AB\t2\t2\t4\t0.0\t0.01\nP1\t10\tAB,AB\t2\t2\t4\t0.0\t0.02\n"
        );
        let (lines, duplicates) = deduplicate(merged.as_bytes()).unwrap();

        assert_eq!(duplicates, 1);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("0.01"));
    }

    #[test]
    fn test_deduplicate_distinguishes_ids_and_positions() {
        let merged = "ID\tbegin\nP1\t10\nP2\t10\nP1\t11\n";
        let (lines, duplicates) = deduplicate(merged.as_bytes()).unwrap();
        assert_eq!(duplicates, 0);
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_deduplicate_file_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MERGED_FILE_NAME);
        fs::write(&path, "ID\tbegin\nP1\t10\nP1\t10\nP1\t10\nP2\t3\n").unwrap();

        let report = deduplicate_file(&path, None).unwrap();
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.kept, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "ID\tbegin\nP1\t10\nP2\t3\n");
    }

    #[test]
    fn test_deduplicate_file_separate_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.tsv");
        let output = dir.path().join("out.tsv");
        fs::write(&input, "ID\tbegin\nP1\t10\nP1\t10\n").unwrap();

        deduplicate_file(&input, Some(&output)).unwrap();
        assert_eq!(
            fs::read_to_string(&input).unwrap(),
            "ID\tbegin\nP1\t10\nP1\t10\n"
        );
        assert_eq!(fs::read_to_string(&output).unwrap(), "ID\tbegin\nP1\t10\n");
    }
}
