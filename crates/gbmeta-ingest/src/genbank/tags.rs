// Tag splitting for GenBank records and REFERENCE sub-blocks

use indexmap::IndexMap;

/// Tag name -> text of every occurrence of that tag, in source order
pub type LogicalBlockMap = IndexMap<String, Vec<String>>;

/// Split `text` into tagged blocks.
///
/// A line that is an uppercase tag followed by whitespace and content starts a
/// new block; every other line is trimmed and appended to the open block.
/// Lines before the first tag are ignored. Repeated tags each get their own
/// entry. Used for whole records and, on the already trimmed text, for the
/// AUTHORS/JOURNAL/PUBMED lines inside a REFERENCE block.
pub fn split_tags(text: &str) -> LogicalBlockMap {
    let mut map = LogicalBlockMap::new();
    let mut current: Option<&str> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in lines_of(text) {
        match tag_line(line) {
            Some((tag, first)) => {
                if let Some(open) = current {
                    push_block(&mut map, open, &buffer);
                }
                buffer.clear();
                map.entry(tag.to_string()).or_default();
                current = Some(tag);
                buffer.push(first);
            },
            None => buffer.push(line.trim()),
        }
    }

    if let Some(open) = current {
        if !buffer.is_empty() {
            push_block(&mut map, open, &buffer);
        }
    }

    map
}

/// Lines of `text` without the trailing run of empty lines
fn lines_of(text: &str) -> impl Iterator<Item = &str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.into_iter()
}

fn push_block(map: &mut LogicalBlockMap, tag: &str, lines: &[&str]) {
    if let Some(blocks) = map.get_mut(tag) {
        blocks.push(lines.join("\n"));
    }
}

/// Match `^([A-Z]+)\s+(.+)$`, returning the tag and its trimmed content
fn tag_line(line: &str) -> Option<(&str, &str)> {
    let tag_len = line
        .bytes()
        .take_while(|b| b.is_ascii_uppercase())
        .count();
    if tag_len == 0 {
        return None;
    }

    let (tag, rest) = line.split_at(tag_len);
    let mut chars = rest.chars();
    // at least one whitespace separator and at least one more character
    match (chars.next(), chars.next()) {
        (Some(sep), Some(_)) if sep.is_whitespace() => Some((tag, rest.trim())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_line() {
        assert_eq!(tag_line("LOCUS       AB123456"), Some(("LOCUS", "AB123456")));
        assert_eq!(tag_line("  ORGANISM  Homo sapiens"), None);
        assert_eq!(tag_line("LOCUS"), None);
        assert_eq!(tag_line("LOCUS "), None);
        assert_eq!(tag_line("Locus  x"), None);
        assert_eq!(tag_line("VERSION1 x"), None);
    }

    #[test]
    fn test_continuation_lines_are_trimmed_and_joined() {
        let text = "DEFINITION  Homo sapiens gene,\n            complete cds.\nACCESSION   AB123456\n";
        let map = split_tags(text);

        assert_eq!(map["DEFINITION"], vec!["Homo sapiens gene,\ncomplete cds."]);
        assert_eq!(map["ACCESSION"], vec!["AB123456"]);
    }

    #[test]
    fn test_repeated_tags_keep_source_order() {
        let text = "REFERENCE   1  (bases 1 to 10)\n  AUTHORS   Smith,J.\nREFERENCE   2  (bases 1 to 10)\n  AUTHORS   Doe,A.\n";
        let map = split_tags(text);

        let refs = &map["REFERENCE"];
        assert_eq!(refs.len(), 2);
        assert!(refs[0].starts_with("1  (bases 1 to 10)"));
        assert!(refs[0].ends_with("AUTHORS   Smith,J."));
        assert!(refs[1].ends_with("AUTHORS   Doe,A."));
    }

    #[test]
    fn test_reference_sub_block_split() {
        let reference = "1  (bases 1 to 10)\nAUTHORS   Smith,J. and\nDoe,A.\nJOURNAL   Unpublished";
        let map = split_tags(reference);

        assert!(!map.contains_key("REFERENCE"));
        assert_eq!(map["AUTHORS"], vec!["Smith,J. and\nDoe,A."]);
        assert_eq!(map["JOURNAL"], vec!["Unpublished"]);
    }

    #[test]
    fn test_lines_before_first_tag_are_dropped() {
        let map = split_tags("garbage\nmore garbage\nKEYWORDS    .\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map["KEYWORDS"], vec!["."]);
    }
}
