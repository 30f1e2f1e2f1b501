//! Protein sequence input.
//!
//! ## Modules
//!
//! - [`io`]: FASTA reading and writing
//!
//! ## Examples
//!
//! ```rust
//! use trsift_core::sequence::protein_id;
//!
//! assert_eq!(protein_id("sp|P04637|P53_HUMAN"), "P04637");
//! assert_eq!(protein_id("P04637"), "P04637");
//! ```

pub mod io;

pub use io::{read_fasta_sequences, write_fasta};

/// Accession part of a FASTA record id.
///
/// UniProt-style ids (`db|ACCESSION|ENTRY_NAME`) yield the accession; any
/// other id is returned as is.
#[must_use]
pub fn protein_id(record_id: &str) -> &str {
    let mut fields = record_id.split('|');
    match (fields.next(), fields.next()) {
        (Some(_), Some(accession)) if !accession.is_empty() => accession,
        _ => record_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protein_id_uniprot() {
        assert_eq!(protein_id("tr|A0A024R161|A0A024R161_HUMAN"), "A0A024R161");
        assert_eq!(protein_id("sp|Q9Y6K9"), "Q9Y6K9");
    }

    #[test]
    fn test_protein_id_plain() {
        assert_eq!(protein_id("P12345"), "P12345");
        assert_eq!(protein_id("sp||NAME"), "sp||NAME");
    }
}
