use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::{
    TrsiftError,
    constants::{ID_COLUMN, RESULT_COLUMNS},
    results::RepeatResults,
    types::{Candidate, CandidateSet, Provenance, RepeatScore, ScoreModel},
};

/// Write results as a tab-separated table with one row per repeat
pub fn write_tsv_format<W: Write>(
    writer: &mut W,
    results: &RepeatResults,
    model: &ScoreModel,
) -> Result<(), TrsiftError> {
    writeln!(writer, "{}", RESULT_COLUMNS.join("\t"))?;

    for candidate in &results.repeats {
        let (divergence, pvalue) = candidate.score(model).map_or_else(
            || (String::new(), String::new()),
            |score| (format_decimal(score.divergence), format_decimal(score.pvalue)),
        );
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            candidate.begin,
            candidate.msa_original(),
            format_decimal(candidate.l_effective),
            format_decimal(candidate.n_effective),
            candidate.region_length,
            divergence,
            pvalue
        )?;
    }
    Ok(())
}

/// Formats a float the way the result tables expect: integral values keep
/// one decimal (`3.0`), everything else uses the shortest round-trip form.
///
/// # Examples
///
/// ```rust
/// use trsift_core::output::format_decimal;
///
/// assert_eq!(format_decimal(3.0), "3.0");
/// assert_eq!(format_decimal(0.0012), "0.0012");
/// ```
#[must_use]
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Column positions of one table header
struct ColumnLayout {
    id: Option<usize>,
    fields: [usize; RESULT_COLUMNS.len()],
    width: usize,
}

impl ColumnLayout {
    fn parse(header: &str) -> Result<Self, TrsiftError> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let position = |column: &str| names.iter().position(|name| *name == column);

        let mut fields = [0; RESULT_COLUMNS.len()];
        for (slot, column) in fields.iter_mut().zip(RESULT_COLUMNS) {
            *slot = position(column).ok_or_else(|| {
                TrsiftError::ParseError(format!("missing column {column:?} in header {header:?}"))
            })?;
        }

        Ok(Self {
            id: position(ID_COLUMN),
            fields,
            width: names.len(),
        })
    }

    fn parse_row(
        &self,
        line: &str,
        line_number: usize,
        model: &ScoreModel,
    ) -> Result<(Option<String>, Candidate), TrsiftError> {
        let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
        if cells.len() != self.width {
            return Err(TrsiftError::ParseError(format!(
                "line {line_number}: expected {} columns, found {}",
                self.width,
                cells.len()
            )));
        }
        let cell = |index: usize| cells[self.fields[index]];

        let begin = parse_number::<usize>(cell(0), "begin", line_number)?;
        let period_alignment: Vec<String> = cell(1)
            .split(',')
            .filter(|unit| !unit.is_empty())
            .map(str::to_string)
            .collect();
        let l_effective = parse_number::<f64>(cell(2), "l_effective", line_number)?;
        let n_effective = parse_number::<f64>(cell(3), "n_effective", line_number)?;
        let region_length = parse_number::<usize>(cell(4), "repeat_region_length", line_number)?;

        let mut candidate = Candidate {
            begin,
            period_alignment,
            l_effective,
            n_effective,
            region_length,
            scores: Default::default(),
            provenance: Provenance::Denovo,
            source_model: None,
        };

        // Rows without scores stay unscored and fail every score filter later.
        let (divergence, pvalue) = (cell(5), cell(6));
        if !divergence.is_empty() || !pvalue.is_empty() {
            let score = RepeatScore::new(
                parse_number::<f64>(pvalue, "pvalue", line_number)?,
                parse_number::<f64>(divergence, "divergence", line_number)?,
            );
            candidate = candidate.with_score(model.clone(), score);
        }

        candidate.validate().map_err(|e| {
            TrsiftError::ParseError(format!("line {line_number}: {e}"))
        })?;

        let id = self.id.map(|index| cells[index].to_string());
        Ok((id, candidate))
    }
}

fn parse_number<T: std::str::FromStr>(
    value: &str,
    column: &str,
    line_number: usize,
) -> Result<T, TrsiftError> {
    value.parse().map_err(|_| {
        TrsiftError::ParseError(format!(
            "line {line_number}: invalid {column} value {value:?}"
        ))
    })
}

/// Reads every row of a result table, calling `visit` with the optional
/// protein id and the parsed candidate.
fn read_rows<R: BufRead>(
    reader: R,
    model: &ScoreModel,
    require_id: bool,
    mut visit: impl FnMut(Option<String>, Candidate),
) -> Result<(), TrsiftError> {
    let mut layout: Option<ColumnLayout> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match &layout {
            None => {
                let parsed = ColumnLayout::parse(&line)?;
                if require_id && parsed.id.is_none() {
                    return Err(TrsiftError::ParseError(format!(
                        "missing column {ID_COLUMN:?} in header {line:?}"
                    )));
                }
                layout = Some(parsed);
            }
            Some(columns) => {
                let (id, candidate) = columns.parse_row(&line, index + 1, model)?;
                visit(id, candidate);
            }
        }
    }
    Ok(())
}

/// Parses a per-protein result table into candidates scored under `model`.
///
/// Column order is taken from the header, and an `ID` column is allowed
/// and ignored. Empty input yields an empty set.
///
/// # Errors
///
/// Returns [`TrsiftError::ParseError`] for a header missing a result column,
/// a row with the wrong number of cells, or a row describing an invalid
/// candidate.
pub fn read_candidate_table<R: BufRead>(
    reader: R,
    model: &ScoreModel,
) -> Result<CandidateSet, TrsiftError> {
    let mut set = CandidateSet::new();
    read_rows(reader, model, false, |_, candidate| set.push(candidate))?;
    Ok(set)
}

/// Parses a merged table into per-protein candidate sets.
///
/// Proteins are returned in the order they first appear; rows of one
/// protein keep their table order.
///
/// # Errors
///
/// As [`read_candidate_table`], and additionally when the header has no
/// `ID` column.
pub fn read_merged_table<R: BufRead>(
    reader: R,
    model: &ScoreModel,
) -> Result<Vec<(String, CandidateSet)>, TrsiftError> {
    let mut proteins: Vec<(String, CandidateSet)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    read_rows(reader, model, true, |id, candidate| {
        let id = id.unwrap_or_default();
        let slot = *positions.entry(id.clone()).or_insert_with(|| {
            proteins.push((id, CandidateSet::new()));
            proteins.len() - 1
        });
        proteins[slot].1.push(candidate);
    })?;
    Ok(proteins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::SequenceCounters;
    use std::io::Cursor;

    const HEADER: &str =
        "begin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\tdivergence\tpvalue";

    fn results_with(repeats: Vec<Candidate>) -> RepeatResults {
        RepeatResults {
            protein_id: "P1".to_string(),
            repeats: CandidateSet::from(repeats),
            counters: SequenceCounters::default(),
        }
    }

    #[test]
    fn test_write_tsv_format_rows() {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        let candidate = Candidate::from_alignment(10, ["AB", "AB", "AB"])
            .unwrap()
            .with_score(ScoreModel::default(), RepeatScore::new(0.001, 0.0));

        write_tsv_format(&mut cursor, &results_with(vec![candidate]), &ScoreModel::default())
            .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(
            output,
            format!("{HEADER}\n10\tAB,AB,AB\t2.0\t3.0\t6\t0.0\t0.001\n")
        );
    }

    #[test]
    fn test_write_tsv_format_header_only() {
        let mut buffer = Vec::new();
        write_tsv_format(&mut buffer, &results_with(Vec::new()), &ScoreModel::default()).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), format!("{HEADER}\n"));
    }

    #[test]
    fn test_write_tsv_format_unscored_model_leaves_cells_empty() {
        let mut buffer = Vec::new();
        let candidate = Candidate::from_alignment(1, ["AB", "AB"]).unwrap();
        write_tsv_format(
            &mut buffer,
            &results_with(vec![candidate]),
            &ScoreModel::new("phylo"),
        )
        .unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.ends_with("\t4\t\t\n"));
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(2.0), "2.0");
        assert_eq!(format_decimal(0.0), "0.0");
        assert_eq!(format_decimal(2.5), "2.5");
        assert_eq!(format_decimal(1.0 / 3.0), "0.3333333333333333");
    }

    #[test]
    fn test_read_candidate_table_preserves_values() {
        let table = format!("{HEADER}\n5\tPEL,PE-\t3.0\t1.7\t5\t0.2\t0.04\n");
        let set = read_candidate_table(table.as_bytes(), &ScoreModel::default()).unwrap();

        assert_eq!(set.len(), 1);
        let candidate = set.get(0).unwrap();
        assert_eq!(candidate.begin, 5);
        assert_eq!(candidate.period_alignment, vec!["PEL", "PE-"]);
        assert_eq!(candidate.n_effective, 1.7);
        assert_eq!(candidate.pvalue(&ScoreModel::default()), Some(0.04));
        assert_eq!(candidate.divergence(&ScoreModel::default()), Some(0.2));
    }

    #[test]
    fn test_read_candidate_table_round_trips_written_output() {
        let candidate = Candidate::from_alignment(3, ["GGS", "GGS", "GG-"])
            .unwrap()
            .with_score(ScoreModel::default(), RepeatScore::new(0.0125, 0.03));
        let mut buffer = Vec::new();
        write_tsv_format(
            &mut buffer,
            &results_with(vec![candidate.clone()]),
            &ScoreModel::default(),
        )
        .unwrap();

        let set = read_candidate_table(buffer.as_slice(), &ScoreModel::default()).unwrap();
        assert_eq!(set.get(0), Some(&candidate));
    }

    #[test]
    fn test_read_candidate_table_empty_input() {
        let set = read_candidate_table("".as_bytes(), &ScoreModel::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_read_candidate_table_accepts_reordered_columns() {
        let table = "pvalue\tdivergence\tbegin\tmsa_original\tl_effective\tn_effective\trepeat_region_length\n\
                     0.01\t0.0\t7\tQQ,QQ\t2\t2\t4\n";
        let set = read_candidate_table(table.as_bytes(), &ScoreModel::default()).unwrap();
        assert_eq!(set.get(0).unwrap().begin, 7);
    }

    #[test]
    fn test_read_candidate_table_missing_column() {
        let table = "begin\tmsa_original\n1\tAB,AB\n";
        let result = read_candidate_table(table.as_bytes(), &ScoreModel::default());
        assert!(matches!(result, Err(TrsiftError::ParseError(_))));
    }

    #[test]
    fn test_read_candidate_table_rejects_bad_numbers() {
        let table = format!("{HEADER}\nx\tAB,AB\t2\t2\t4\t0.0\t0.01\n");
        let err = read_candidate_table(table.as_bytes(), &ScoreModel::default()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_read_candidate_table_rejects_invalid_candidate() {
        // region length disagrees with the alignment
        let table = format!("{HEADER}\n1\tAB,AB\t2\t2\t9\t0.0\t0.01\n");
        let result = read_candidate_table(table.as_bytes(), &ScoreModel::default());
        assert!(matches!(result, Err(TrsiftError::ParseError(_))));
    }

    #[test]
    fn test_read_merged_table_requires_id() {
        let table = format!("{HEADER}\n1\tAB,AB\t2\t2\t4\t0.0\t0.01\n");
        let result = read_merged_table(table.as_bytes(), &ScoreModel::default());
        assert!(matches!(result, Err(TrsiftError::ParseError(_))));
    }

    #[test]
    fn test_read_merged_table_first_seen_order() {
        let table = format!(
            "ID\t{HEADER}\nP2\t1\tAB,AB\t2\t2\t4\t0.0\t0.01\n\
             P1\t9\tCD,CD\t2\t2\t4\t0.0\t0.01\nP2\t30\tEF,EF\t2\t2\t4\t0.0\t0.01\n"
        );
        let proteins = read_merged_table(table.as_bytes(), &ScoreModel::default()).unwrap();

        let ids: Vec<&str> = proteins.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P1"]);
        assert_eq!(proteins[0].1.len(), 2);
        assert_eq!(proteins[0].1.get(1).unwrap().begin, 30);
    }
}
