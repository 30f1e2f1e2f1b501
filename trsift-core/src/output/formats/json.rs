use std::io::Write;

use serde::Serialize;

use crate::{TrsiftError, results::RepeatResults, types::Candidate};

#[derive(Serialize)]
struct ProteinRecord<'a> {
    id: &'a str,
    repeats: &'a [Candidate],
}

/// Write results as a pretty-printed JSON document followed by a newline
pub fn write_json_format<W: Write>(
    writer: &mut W,
    results: &RepeatResults,
) -> Result<(), TrsiftError> {
    let record = ProteinRecord {
        id: &results.protein_id,
        repeats: results.repeats.as_slice(),
    };
    serde_json::to_writer_pretty(&mut *writer, &record)
        .map_err(|e| TrsiftError::ParseError(format!("JSON serialisation failed: {e}")))?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::SequenceCounters;
    use crate::types::{CandidateSet, RepeatScore, ScoreModel};

    #[test]
    fn test_write_json_format_structure() {
        let candidate = Candidate::from_alignment(7, ["SR", "SR", "SR"])
            .unwrap()
            .with_score(ScoreModel::default(), RepeatScore::new(0.02, 0.0));
        let results = RepeatResults {
            protein_id: "Q9".to_string(),
            repeats: CandidateSet::from(vec![candidate]),
            counters: SequenceCounters::default(),
        };

        let mut buffer = Vec::new();
        write_json_format(&mut buffer, &results).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["id"], "Q9");
        let repeat = &value["repeats"][0];
        assert_eq!(repeat["begin"], 7);
        assert_eq!(repeat["region_length"], 6);
        assert_eq!(repeat["provenance"], "denovo");
        assert_eq!(repeat["scores"]["phylo_gap01"]["pvalue"], 0.02);
        assert!(repeat["source_model"].is_null());
    }

    #[test]
    fn test_write_json_format_empty() {
        let results = RepeatResults {
            protein_id: "Q0".to_string(),
            repeats: CandidateSet::new(),
            counters: SequenceCounters::default(),
        };
        let mut buffer = Vec::new();
        write_json_format(&mut buffer, &results).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["repeats"].as_array().unwrap().len(), 0);
    }
}
