// GenBank record parser
//
// Extracts the metadata fields of one LOCUS record. Only LOCUS, DEFINITION and
// a readable LOCUS date are mandatory; every other section is optional and any
// odd shape inside one is skipped rather than reported as an error.

use gbmeta_common::checksum::shard_of;
use indexmap::IndexSet;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use super::models::{DbXRef, FeatureMap, Journal, ParsedRecord};
use super::tags::{split_tags, LogicalBlockMap};

const TAG_LOCUS: &str = "LOCUS";
const TAG_DEFINITION: &str = "DEFINITION";
const TAG_VERSION: &str = "VERSION";
const TAG_KEYWORDS: &str = "KEYWORDS";
const TAG_REFERENCE: &str = "REFERENCE";
const TAG_AUTHORS: &str = "AUTHORS";
const TAG_JOURNAL: &str = "JOURNAL";
const TAG_PUBMED: &str = "PUBMED";
const TAG_FEATURES: &str = "FEATURES";

const FEATURE_DBXREF: &str = "db_xref";

/// Zero-based position of the `DD-MON-YYYY` date among the LOCUS tokens
const LOCUS_DATE_TOKEN: usize = 6;

/// Length of the `GI:` prefix on the second VERSION token
const GI_PREFIX_LEN: usize = 3;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Failure that rejects a whole record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("required tag {0} not found")]
    MissingRequiredTag(&'static str),

    #[error("cannot parse LOCUS date '{value}': {reason}")]
    DateParse { value: String, reason: String },
}

/// Parses raw LOCUS records into [`ParsedRecord`]s.
///
/// Holds the compiled patterns, so build one per worker and reuse it.
pub struct RecordParser {
    keyword_separator: Regex,
    whitespace_run: Regex,
    author_separator: Regex,
}

impl RecordParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            keyword_separator: Regex::new(r"\s*;\s*")?,
            whitespace_run: Regex::new(r"\s{2,}")?,
            author_separator: Regex::new(r"(,|\s+and)\s+")?,
        })
    }

    /// Parse one record (the text from its LOCUS line up to the next one)
    pub fn parse(&self, text: &str) -> Result<ParsedRecord, RecordError> {
        let map = split_tags(text);

        let locus_block = first_block(&map, TAG_LOCUS)?;
        let locus = locus_block
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        let partition_key = partition_key(&locus);

        let (month, year) = parse_date(locus_block)?;
        let definition = first_block(&map, TAG_DEFINITION)?.replace('\n', " ");
        let (version, gi_number) = parse_version(&map);
        let keywords = self.parse_keywords(&map);
        let journals = self.parse_journals(&map);
        let mut features = parse_features(&map, &locus);
        let dbxrefs = extract_dbxrefs(&mut features);

        Ok(ParsedRecord {
            locus,
            partition_key,
            month,
            year,
            definition,
            version,
            gi_number,
            keywords,
            journals,
            features,
            dbxrefs,
        })
    }

    fn parse_keywords(&self, map: &LogicalBlockMap) -> Vec<String> {
        let Some(block) = map.get(TAG_KEYWORDS).and_then(|b| b.first()) else {
            return Vec::new();
        };

        let mut text = block.replace('\n', " ").trim().to_string();
        // drop the terminating '.'
        text.pop();

        self.keyword_separator
            .split(&text)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn parse_journals(&self, map: &LogicalBlockMap) -> Vec<Journal> {
        map.get(TAG_REFERENCE)
            .map(|refs| refs.iter().filter_map(|r| self.parse_journal(r)).collect())
            .unwrap_or_default()
    }

    fn parse_journal(&self, reference: &str) -> Option<Journal> {
        let parts = split_tags(reference);
        let journal = parts.get(TAG_JOURNAL)?.first()?;

        let citation = journal.replace('\n', " ");
        let name = journal_name(&citation);
        let pmid = parts
            .get(TAG_PUBMED)
            .and_then(|b| b.first())
            .cloned();
        let authors = parts
            .get(TAG_AUTHORS)
            .and_then(|b| b.first())
            .map(|a| self.split_authors(a));

        Some(Journal {
            name,
            citation,
            pmid,
            authors,
        })
    }

    fn split_authors(&self, block: &str) -> Vec<String> {
        let text = block.replace('\n', " ");
        let text = self.whitespace_run.replace_all(&text, " ");

        let mut authors: Vec<String> = self
            .author_separator
            .split(&text)
            .map(str::to_string)
            .collect();
        while authors.last().is_some_and(|a| a.is_empty()) {
            authors.pop();
        }
        authors
    }
}

/// Shard of a locus in 0..=255
pub fn partition_key(locus: &str) -> u8 {
    shard_of(locus.as_bytes())
}

fn first_block<'a>(map: &'a LogicalBlockMap, tag: &'static str) -> Result<&'a str, RecordError> {
    map.get(tag)
        .and_then(|blocks| blocks.first())
        .map(String::as_str)
        .ok_or(RecordError::MissingRequiredTag(tag))
}

/// Month and year from the `DD-MON-YYYY` token of the LOCUS line
fn parse_date(locus_block: &str) -> Result<(u32, i32), RecordError> {
    let token = locus_block
        .split_whitespace()
        .nth(LOCUS_DATE_TOKEN)
        .ok_or_else(|| RecordError::DateParse {
            value: locus_block.to_string(),
            reason: "LOCUS line has no date token".to_string(),
        })?;

    let fail = |reason: &str| RecordError::DateParse {
        value: token.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = token.split('-').collect();
    if parts.len() < 3 {
        return Err(fail("expected DD-MON-YYYY"));
    }

    let month = MONTHS
        .iter()
        .position(|m| *m == parts[1])
        .map(|i| i as u32 + 1)
        .ok_or_else(|| fail("unknown month"))?;
    let year = parts[2].parse::<i32>().map_err(|_| fail("invalid year"))?;

    Ok((month, year))
}

/// Version suffix and GI number from the first VERSION block
fn parse_version(map: &LogicalBlockMap) -> (Option<String>, Option<String>) {
    let Some(block) = map.get(TAG_VERSION).and_then(|b| b.first()) else {
        return (None, None);
    };

    let mut tokens = block.split_whitespace();
    let version = tokens.next().map(|accession| match accession.rfind('.') {
        Some(dot) => accession[dot + 1..].to_string(),
        None => accession.to_string(),
    });
    // current releases omit the GI token
    let gi_number = tokens
        .next()
        .and_then(|gi| gi.get(GI_PREFIX_LEN..))
        .map(str::to_string);

    (version, gi_number)
}

/// Journal title: leading words up to the first one containing a digit.
/// Direct submissions and unpublished references get a fixed name.
fn journal_name(citation: &str) -> String {
    let lower = citation.to_lowercase();
    if lower.starts_with("submitted") {
        return "Submitted".to_string();
    }
    if lower.starts_with("unpublished") {
        return "Unpublished".to_string();
    }

    let name = citation
        .split_whitespace()
        .take_while(|w| !w.chars().any(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        warn!("JOURNAL text '{}' starts with a number; journal name is empty", citation);
    }
    name
}

/// Qualifiers (`/key=value`) of the FEATURES block.
///
/// Quoted values may continue over following lines; they are joined with a
/// single space and the enclosing quotes removed.
fn parse_features(map: &LogicalBlockMap, locus: &str) -> FeatureMap {
    let mut features = FeatureMap::new();
    let Some(block) = map.get(TAG_FEATURES).and_then(|b| b.first()) else {
        return features;
    };

    let lines: Vec<&str> = block.split('\n').collect();
    let mut next = 0;

    while next < lines.len() {
        let line = lines[next];
        next += 1;

        let Some(qualifier) = line.strip_prefix('/') else {
            continue;
        };
        let Some((key, raw)) = qualifier.split_once('=') else {
            continue;
        };

        let mut value = raw.to_string();
        if value.starts_with('"') {
            // opening quote alone on its line
            if value.len() == 1 {
                if let Some(following) = lines.get(next) {
                    value.push_str(following.trim());
                    next += 1;
                }
            }

            while value.len() < 2 || !value.ends_with('"') {
                let Some(following) = lines.get(next) else {
                    warn!(
                        "Unterminated quoted value for /{} in record {}; keeping text up to end of FEATURES",
                        key, locus
                    );
                    break;
                };
                value.push(' ');
                value.push_str(following.trim());
                next += 1;
            }

            let inner = &value[1..];
            value = inner.strip_suffix('"').unwrap_or(inner).to_string();
        }

        features
            .entry(key.to_string())
            .or_insert_with(IndexSet::new)
            .insert(value);
    }

    features
}

/// Move `db_xref` qualifiers out of `features` into database references.
///
/// `name:id` gives a reference with an id, a bare `name` one without; values
/// with more separators are dropped.
fn extract_dbxrefs(features: &mut FeatureMap) -> Vec<DbXRef> {
    let Some(values) = features.shift_remove(FEATURE_DBXREF) else {
        return Vec::new();
    };

    values
        .iter()
        .filter_map(|value| {
            let parts = split_dropping_trailing_empty(value, ':');
            match parts.as_slice() {
                [name] => Some(DbXRef::new(*name, None)),
                [name, id] => Some(DbXRef::new(*name, Some(id.to_string()))),
                _ => None,
            }
        })
        .collect()
}

/// Split on `sep` and drop trailing empty parts; text without `sep` is a
/// single part even when empty
fn split_dropping_trailing_empty(text: &str, sep: char) -> Vec<&str> {
    if !text.contains(sep) {
        return vec![text];
    }

    let mut parts: Vec<&str> = text.split(sep).collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const RECORD: &str = "\
LOCUS       AB123456                 120 bp    DNA     linear   PRI 01-JAN-2020
DEFINITION  Test gene.
ACCESSION   AB123456
VERSION     AB123456.1  GI:999
KEYWORDS    foo; bar.
SOURCE      Homo sapiens (human)
  ORGANISM  Homo sapiens
REFERENCE   1  (bases 1 to 120)
  AUTHORS   Smith,J., Doe,A. and Roe,B.
  TITLE     A test sequence
  JOURNAL   Nature 12 (3), 45-67 (2019)
   PUBMED   12345678
REFERENCE   2  (bases 1 to 120)
  AUTHORS   Smith,J.
  TITLE     Direct Submission
  JOURNAL   Submitted (01-JAN-2020) Test Institute, Nowhere
REFERENCE   3
  REMARK    no journal here
FEATURES             Location/Qualifiers
     source          1..120
                     /organism=\"Homo sapiens\"
                     /mol_type=\"genomic DNA\"
                     /db_xref=\"taxon:9606\"
     gene            1..120
                     /gene=\"tst\"
                     /note=\"a note that runs
                     over two lines\"
                     /db_xref=\"GeneID:42\"
                     /pseudo
";

    fn parser() -> RecordParser {
        RecordParser::new().unwrap()
    }

    #[test]
    fn test_parse_minimal_record() {
        let text = "\
LOCUS       AB123456   12 bp    DNA     linear   PRI 01-JAN-2020
DEFINITION  Test gene.
VERSION     AB123456.1  GI:999
KEYWORDS    foo; bar.
FEATURES             Location/Qualifiers
     gene            1..12
                     /db_xref=\"GeneID:42\"
";
        let record = parser().parse(text).unwrap();

        assert_eq!(record.locus, "AB123456");
        assert_eq!(record.partition_key, 231);
        assert_eq!(record.month, 1);
        assert_eq!(record.year, 2020);
        assert_eq!(record.definition, "Test gene.");
        assert_eq!(record.version.as_deref(), Some("1"));
        assert_eq!(record.gi_number.as_deref(), Some("999"));
        assert_eq!(record.keywords, vec!["foo", "bar"]);
        assert_eq!(record.dbxrefs, vec![DbXRef::new("GeneID", Some("42".to_string()))]);
        assert!(!record.features.contains_key("db_xref"));
    }

    #[test]
    fn test_parse_full_record() {
        let record = parser().parse(RECORD).unwrap();

        assert_eq!(record.journals.len(), 2);

        let first = &record.journals[0];
        assert_eq!(first.name, "Nature");
        assert_eq!(first.citation, "Nature 12 (3), 45-67 (2019)");
        assert_eq!(first.pmid.as_deref(), Some("12345678"));
        assert_eq!(
            first.authors.as_deref(),
            Some(&["Smith,J.".to_string(), "Doe,A.".to_string(), "Roe,B.".to_string()][..])
        );

        let second = &record.journals[1];
        assert_eq!(second.name, "Submitted");
        assert_eq!(second.pmid, None);

        assert_eq!(record.authors(), vec!["Smith,J.", "Doe,A.", "Roe,B."]);

        assert_eq!(
            record.dbxrefs,
            vec![
                DbXRef::new("taxon", Some("9606".to_string())),
                DbXRef::new("GeneID", Some("42".to_string())),
            ]
        );
        assert_eq!(
            record.features.keys().collect::<Vec<_>>(),
            vec!["organism", "mol_type", "gene", "note"]
        );
        assert!(record.features["note"].contains("a note that runs over two lines"));
    }

    #[test]
    fn test_missing_locus() {
        let err = parser().parse("DEFINITION  Orphan.\n").unwrap_err();
        assert_eq!(err, RecordError::MissingRequiredTag("LOCUS"));
    }

    #[test]
    fn test_missing_definition() {
        let text = "LOCUS       X   1 bp    DNA     linear   PRI 01-JAN-2020\n";
        let err = parser().parse(text).unwrap_err();
        assert_eq!(err, RecordError::MissingRequiredTag("DEFINITION"));
    }

    #[test]
    fn test_bad_date() {
        let bad_month = "LOCUS       X   1 bp    DNA     linear   PRI 01-FOO-2020\nDEFINITION  d.\n";
        assert!(matches!(parser().parse(bad_month), Err(RecordError::DateParse { .. })));

        let no_date = "LOCUS       X   1 bp    DNA\nDEFINITION  d.\n";
        assert!(matches!(parser().parse(no_date), Err(RecordError::DateParse { .. })));

        let bad_year = "LOCUS       X   1 bp    DNA     linear   PRI 01-MAR-20x0\nDEFINITION  d.\n";
        assert!(matches!(parser().parse(bad_year), Err(RecordError::DateParse { .. })));
    }

    #[test]
    fn test_version_without_gi() {
        let text = "LOCUS       X   1 bp    DNA     linear   PRI 05-DEC-2021\nDEFINITION  d.\nVERSION     X.3\n";
        let record = parser().parse(text).unwrap();

        assert_eq!(record.month, 12);
        assert_eq!(record.version.as_deref(), Some("3"));
        assert_eq!(record.gi_number, None);
    }

    #[test]
    fn test_quoted_value_split_over_lines() {
        let text = "\
LOCUS       X   1 bp    DNA     linear   PRI 01-JAN-2020
DEFINITION  d.
FEATURES             Location/Qualifiers
     CDS             1..3
                     /product=\"first
                     second
                     third\"
                     /note=\"
                     starts on next line\"
";
        let record = parser().parse(text).unwrap();

        assert!(record.features["product"].contains("first second third"));
        assert!(record.features["note"].contains("starts on next line"));
    }

    #[test]
    fn test_unterminated_quote_keeps_text() {
        let text = "\
LOCUS       X   1 bp    DNA     linear   PRI 01-JAN-2020
DEFINITION  d.
FEATURES             Location/Qualifiers
                     /note=\"never closed
                     still open
";
        let record = parser().parse(text).unwrap();
        assert!(record.features["note"].contains("never closed still open"));
    }

    #[test]
    fn test_feature_values_are_deduplicated() {
        let text = "\
LOCUS       X   1 bp    DNA     linear   PRI 01-JAN-2020
DEFINITION  d.
FEATURES             Location/Qualifiers
                     /gene=\"a\"
                     /gene=\"b\"
                     /gene=\"a\"
";
        let record = parser().parse(text).unwrap();
        let genes: Vec<_> = record.features["gene"].iter().cloned().collect();
        assert_eq!(genes, vec!["a", "b"]);
    }

    #[test]
    fn test_dbxref_part_counts() {
        let mut features = FeatureMap::new();
        let values = features.entry("db_xref".to_string()).or_default();
        values.insert("GeneID:42".to_string());
        values.insert("NoId".to_string());
        values.insert("Trailing:".to_string());
        values.insert("a:b:c".to_string());
        values.insert(":".to_string());

        let refs = extract_dbxrefs(&mut features);

        assert_eq!(
            refs,
            vec![
                DbXRef::new("GeneID", Some("42".to_string())),
                DbXRef::new("NoId", None),
                DbXRef::new("Trailing", None),
            ]
        );
        assert!(features.is_empty());
    }

    #[test]
    fn test_journal_name_heuristic() {
        assert_eq!(journal_name("J. Biol. Chem. 270 (1), 1-5 (1995)"), "J. Biol. Chem.");
        assert_eq!(journal_name("UNPUBLISHED"), "Unpublished");
        assert_eq!(journal_name("submitted (01-JAN-2020)"), "Submitted");
        assert_eq!(journal_name("2020 report"), "");
    }

    #[test]
    fn test_empty_keywords() {
        let text = "LOCUS       X   1 bp    DNA     linear   PRI 01-JAN-2020\nDEFINITION  d.\nKEYWORDS    .\n";
        assert!(parser().parse(text).unwrap().keywords.is_empty());
    }

    #[test]
    fn test_multiline_definition() {
        let text = "LOCUS       X   1 bp    DNA     linear   PRI 01-JAN-2020\nDEFINITION  Homo sapiens gene,\n            complete cds.\n";
        let record = parser().parse(text).unwrap();
        assert_eq!(record.definition, "Homo sapiens gene, complete cds.");
    }
}
