// Data models for parsed GenBank records

use indexmap::{IndexMap, IndexSet};

/// Feature qualifiers of one record: qualifier name -> distinct values,
/// both in first-seen order
pub type FeatureMap = IndexMap<String, IndexSet<String>>;

/// Structured metadata extracted from one LOCUS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Accession name from the LOCUS line
    pub locus: String,

    /// Shard in 0..=255 derived from `locus`
    pub partition_key: u8,

    /// Month of the LOCUS date (1..=12)
    pub month: u32,

    /// Year of the LOCUS date
    pub year: i32,

    pub definition: String,

    /// Sequence version, the part after the last '.' of `LOCUS.N`
    pub version: Option<String>,

    /// GI identifier without its `GI:` prefix
    pub gi_number: Option<String>,

    pub keywords: Vec<String>,
    pub journals: Vec<Journal>,

    /// Feature qualifiers, with `db_xref` already moved into `dbxrefs`
    pub features: FeatureMap,

    pub dbxrefs: Vec<DbXRef>,
}

impl ParsedRecord {
    /// Authors of all journals, first occurrence order, without duplicates.
    /// Journals without an AUTHORS block contribute nothing.
    pub fn authors(&self) -> Vec<&str> {
        let mut seen = IndexSet::new();
        for author in self
            .journals
            .iter()
            .filter_map(|j| j.authors.as_ref())
            .flatten()
        {
            seen.insert(author.as_str());
        }
        seen.into_iter().collect()
    }
}

/// Publication reference taken from a REFERENCE block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    pub name: String,

    /// Full JOURNAL text on one line
    pub citation: String,

    pub pmid: Option<String>,

    /// `None` when the reference has no AUTHORS block at all
    pub authors: Option<Vec<String>>,
}

/// Cross reference to an external database (`/db_xref="GeneID:42"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbXRef {
    pub database_name: String,
    pub database_id: Option<String>,
}

impl DbXRef {
    pub fn new(database_name: impl Into<String>, database_id: Option<String>) -> Self {
        Self {
            database_name: database_name.into(),
            database_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal(authors: Option<&[&str]>) -> Journal {
        Journal {
            name: "Nature".to_string(),
            citation: "Nature 1 (2) 3-4 (2000)".to_string(),
            pmid: None,
            authors: authors.map(|a| a.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn test_authors_union_keeps_first_occurrence_order() {
        let record = ParsedRecord {
            locus: "AB123456".to_string(),
            partition_key: 231,
            month: 1,
            year: 2020,
            definition: "Test gene.".to_string(),
            version: None,
            gi_number: None,
            keywords: vec![],
            journals: vec![
                journal(Some(&["Smith,J.", "Doe,A."])),
                journal(None),
                journal(Some(&["Roe,B.", "Smith,J."])),
            ],
            features: FeatureMap::new(),
            dbxrefs: vec![],
        };

        assert_eq!(record.authors(), vec!["Smith,J.", "Doe,A.", "Roe,B."]);
    }
}
