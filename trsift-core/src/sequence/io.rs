use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bio::io::fasta;

use super::protein_id;
use crate::types::{Sequence, TrsiftError};

/// Reads every record of a protein FASTA file.
///
/// Record ids are reduced to their accession with [`protein_id`]; the full
/// header remainder is kept as the description.
///
/// # Errors
///
/// Returns [`TrsiftError::IoError`] if the file cannot be opened and
/// [`TrsiftError::ParseError`] for malformed records.
pub fn read_fasta_sequences<P: AsRef<Path>>(path: P) -> Result<Vec<Sequence>, TrsiftError> {
    let file = File::open(path.as_ref())?;
    let reader = fasta::Reader::new(BufReader::new(file));
    let mut sequences = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| TrsiftError::ParseError(e.to_string()))?;
        let mut sequence = Sequence::new(protein_id(record.id()), record.seq().to_vec());
        sequence.description = record.desc().map(String::from);
        sequences.push(sequence);
    }

    Ok(sequences)
}

/// Encodes one sequence as a FASTA record, as fed to external tools.
///
/// # Errors
///
/// Returns [`TrsiftError::IoError`] if the record cannot be encoded.
pub fn write_fasta(sequence: &Sequence) -> Result<Vec<u8>, TrsiftError> {
    let mut buffer = Vec::new();
    {
        let mut writer = fasta::Writer::new(&mut buffer);
        writer.write(
            &sequence.id,
            sequence.description.as_deref(),
            &sequence.residues,
        )?;
        writer.flush()?;
    }
    Ok(buffer)
}
