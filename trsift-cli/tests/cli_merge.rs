mod common;

use std::fs;

use insta::assert_snapshot;
use tempfile::TempDir;

use crate::common::{RESULT_HEADER, trsift, write_file};

fn result_table(rows: &[&str]) -> String {
    let mut table = format!("{RESULT_HEADER}\n");
    for row in rows {
        table.push_str(row);
        table.push('\n');
    }
    table
}

#[test]
fn merge_prefixes_rows_with_protein_ids() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "P2.tsv",
        &result_table(&["7\tKV,KV,KV\t2.0\t3.0\t6\t0.0\t0.02"]),
    );
    write_file(
        dir.path(),
        "P1.tsv",
        &result_table(&["10\tAB,AB,AB\t2.0\t3.0\t6\t0.0\t0.001"]),
    );

    trsift()
        .args(["merge", "--dir"])
        .arg(dir.path())
        .assert()
        .success();

    let merged = fs::read_to_string(dir.path().join("merged.tsv")).unwrap();
    assert_snapshot!(merged.replace('\t', " | "), @r"
    ID | begin | msa_original | l_effective | n_effective | repeat_region_length | divergence | pvalue
    P1 | 10 | AB,AB,AB | 2.0 | 3.0 | 6 | 0.0 | 0.001
    P2 | 7 | KV,KV,KV | 2.0 | 3.0 | 6 | 0.0 | 0.02
    ");
}

#[test]
fn merge_to_explicit_output() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "P1.tsv", &result_table(&[]));
    let output = dir.path().join("all.tsv");

    trsift()
        .args(["merge", "-q", "--dir"])
        .arg(dir.path())
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        format!("ID\t{RESULT_HEADER}\n")
    );
}

#[test]
fn merge_fails_on_header_mismatch() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "P1.tsv", &result_table(&[]));
    write_file(dir.path(), "P2.tsv", "start\tend\n1\t5\n");

    let stderr = trsift()
        .args(["merge", "--dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();

    assert!(String::from_utf8_lossy(&stderr).contains("HeaderMismatch"));
    assert!(!dir.path().join("merged.tsv").exists());
}

#[test]
fn merge_fails_on_empty_directory() {
    let dir = TempDir::new().unwrap();
    trsift()
        .args(["merge", "--dir"])
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn dedup_reports_duplicates() {
    let dir = TempDir::new().unwrap();
    let merged = write_file(
        dir.path(),
        "merged.tsv",
        &format!(
            "ID\t{RESULT_HEADER}\n\
             P1\t10\tAB,AB,AB\t2.0\t3.0\t6\t0.0\t0.001\n\
             P1\t10\tAB,AB,AB\t2.0\t3.0\t6\t0.0\t0.001\n\
             P2\t10\tKV,KV,KV\t2.0\t3.0\t6\t0.0\t0.02\n"
        ),
    );

    let output = trsift()
        .args(["dedup", "--overwrite", "--file"])
        .arg(&merged)
        .assert()
        .success()
        .get_output()
        .stderr
        .clone();

    assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @"Removed 1 duplicate rows; 2 rows written to merged.tsv");
    assert_eq!(fs::read_to_string(&merged).unwrap().lines().count(), 3);
}

#[test]
fn dedup_requires_a_destination() {
    let dir = TempDir::new().unwrap();
    let merged = write_file(dir.path(), "merged.tsv", "ID\tbegin\n");

    trsift()
        .args(["dedup", "--file"])
        .arg(&merged)
        .assert()
        .failure();
}
