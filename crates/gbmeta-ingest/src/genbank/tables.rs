// Projection of parsed records onto the output tables
//
// Every row starts with (partition_key, locus), the join key shared by all
// six tables.

use std::io;

use super::models::ParsedRecord;
use crate::table::{FieldValue, TableKind, TableSet};

/// Annotation values are indexed on this many leading characters
const ANNOTATION_INDEX_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Basic,
    Keywords,
    DbXRefs,
    Journals,
    Authors,
    Annotations,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Basic,
        Table::Keywords,
        Table::DbXRefs,
        Table::Journals,
        Table::Authors,
        Table::Annotations,
    ];
}

impl TableKind for Table {
    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Table::Basic => "basic",
            Table::Keywords => "keywords",
            Table::DbXRefs => "dbxrefs",
            Table::Journals => "journals",
            Table::Authors => "authors",
            Table::Annotations => "annotations",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Table::Basic => "basic.txt",
            Table::Keywords => "keywords.txt",
            Table::DbXRefs => "dbxrefs.txt",
            Table::Journals => "journals.txt",
            Table::Authors => "authors.txt",
            Table::Annotations => "annotations.txt",
        }
    }
}

/// Route one record's rows into `tables`
pub fn project(record: &ParsedRecord, tables: &mut TableSet<Table>) -> io::Result<()> {
    let pk = FieldValue::from(record.partition_key);
    let locus = FieldValue::from(&record.locus);

    tables.writer(Table::Basic).add_row(&[
        pk.clone(),
        locus.clone(),
        record.year.into(),
        record.month.into(),
        record.version.as_deref().into(),
        record.gi_number.as_deref().into(),
        (&record.definition).into(),
    ])?;

    let keywords = tables.writer(Table::Keywords);
    for keyword in &record.keywords {
        keywords.add_row(&[pk.clone(), locus.clone(), keyword.into()])?;
    }

    let authors = tables.writer(Table::Authors);
    for author in record.authors() {
        authors.add_row(&[pk.clone(), locus.clone(), author.into()])?;
    }

    let journals = tables.writer(Table::Journals);
    for journal in &record.journals {
        journals.add_row(&[
            pk.clone(),
            locus.clone(),
            (&journal.name).into(),
            (&journal.citation).into(),
            journal.pmid.as_deref().into(),
        ])?;
    }

    let dbxrefs = tables.writer(Table::DbXRefs);
    for xref in &record.dbxrefs {
        dbxrefs.add_row(&[
            pk.clone(),
            locus.clone(),
            (&xref.database_name).into(),
            xref.database_id.as_deref().into(),
        ])?;
    }

    let annotations = tables.writer(Table::Annotations);
    for (name, values) in &record.features {
        for value in values {
            annotations.add_row(&[
                pk.clone(),
                locus.clone(),
                name.into(),
                index_prefix(value).into(),
                value.into(),
            ])?;
        }
    }

    Ok(())
}

fn index_prefix(value: &str) -> &str {
    match value.char_indices().nth(ANNOTATION_INDEX_LEN) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}
