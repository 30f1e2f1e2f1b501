#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

pub const RESULT_HEADER: &str =
    "begin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\tdivergence\tpvalue";

/// Three proteins: P1 with two overlapping candidates and a disjoint one,
/// P2 with a single insignificant candidate, P3 with none
pub const PROTEINS: &str = "\
>sp|P1|REP1_HUMAN Repeat protein 1
MABCABCABCABCKLMNOPQRSTUVWXYZKLMNOPQRSTUQQQQQQ
>sp|P2|REP2_HUMAN Repeat protein 2
MKVKVKVKV
>sp|P3|REP3_HUMAN Repeat protein 3
MSTNDE
";

/// De novo candidates for [`PROTEINS`] as a merged table
pub fn candidate_table() -> String {
    [
        format!("ID\t{RESULT_HEADER}"),
        "P1\t1\tABC,ABC,ABC\t3\t3\t9\t0.0\t0.2".to_string(),
        "P1\t5\tBCA,BCA,BCA\t3\t3\t9\t0.0\t0.01".to_string(),
        "P1\t40\tQQ,QQ,QQ\t2\t3\t6\t0.0\t0.01".to_string(),
        "P2\t2\tKV,KV,KV,KV\t2\t4\t8\t0.0\t0.5".to_string(),
    ]
    .join("\n")
        + "\n"
}

/// Writes `content` to `dir/name` and returns the path
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Writes an executable shell script to `dir/name`
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = write_file(dir, name, &format!("#!/bin/sh\n{body}\n"));
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

/// The trsift binary with logging limited to errors
pub fn trsift() -> Command {
    let mut cmd = Command::cargo_bin("trsift").unwrap();
    cmd.env("RUST_LOG", "error");
    cmd
}

/// Runs `trsift run` over [`PROTEINS`] and [`candidate_table`] with extra
/// arguments, returning the captured stderr
pub fn run_with_candidates(dir: &Path, outdir: &Path, extra: &[&str]) -> String {
    let fasta = write_file(dir, "proteins.fasta", PROTEINS);
    let table = write_file(dir, "denovo.tsv", &candidate_table());

    let output = trsift()
        .arg("run")
        .arg("--fasta")
        .arg(&fasta)
        .arg("--candidates")
        .arg(&table)
        .arg("--outdir")
        .arg(outdir)
        .args(extra)
        .assert()
        .success()
        .get_output()
        .stderr
        .clone();
    String::from_utf8(output).unwrap()
}
