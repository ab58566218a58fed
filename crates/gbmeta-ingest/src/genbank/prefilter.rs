// Line pre-filter for GenBank flat files
//
// Division files are dominated by sequence data (ORIGIN/CONTIG sections),
// protein translations and variation features, none of which end up in the
// output tables. Dropping them line by line before records are assembled
// keeps per-record memory small.

use std::borrow::Cow;
use std::io::{self, BufRead};
use tracing::debug;

use super::splitter::RECORD_START;

const BLOCK_END_MARKERS: [&str; 2] = ["ORIGIN", "CONTIG"];
const VARIATION_FEATURE: &str = "variation";
const VARIATION_END: &str = "/db_xref=\"";
const TRANSLATION_START: &str = "/translation=\"";

/// Counters describing what the filter did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreFilterStats {
    pub lines_read: u64,
    pub lines_emitted: u64,

    /// Translations opened and closed on the same line. The filter only
    /// closes a translation on a later line, so these keep dropping lines
    /// until the next line ending in a quote.
    pub single_line_translations: u64,
}

/// Streaming line filter with three flags: inside a record, inside a
/// variation feature, inside a translation value.
#[derive(Debug, Default)]
pub struct PreFilter {
    in_record: bool,
    in_variation: bool,
    in_translation: bool,
    stats: PreFilterStats,
}

impl PreFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the flags with `line` and report whether it is kept
    pub fn accept(&mut self, line: &str) -> bool {
        self.stats.lines_read += 1;

        if line.starts_with(RECORD_START) {
            self.in_record = true;
            self.in_translation = false;
        } else if BLOCK_END_MARKERS.iter().any(|m| line.starts_with(m)) {
            self.in_record = false;
        }

        if !self.in_record {
            return false;
        }

        if is_variation_feature(line) {
            self.in_variation = true;
        } else if self.in_variation && line.contains(VARIATION_END) {
            self.in_variation = false;
        }

        if let Some(pos) = line.find(TRANSLATION_START) {
            self.in_translation = true;
            if line[pos + TRANSLATION_START.len()..].ends_with('"') {
                self.stats.single_line_translations += 1;
                debug!(
                    "Single-line /translation value; lines are dropped until the next closing quote"
                );
            }
        } else if self.in_translation && line.ends_with('"') {
            self.in_translation = false;
        }

        let keep = !self.in_variation && !self.in_translation;
        if keep {
            self.stats.lines_emitted += 1;
        }
        keep
    }

    pub fn stats(&self) -> PreFilterStats {
        self.stats
    }
}

/// Matches `^\s+variation\s+.+$`
fn is_variation_feature(line: &str) -> bool {
    let body = line.trim_start();
    if body.len() == line.len() {
        return false;
    }

    let Some(rest) = body.strip_prefix(VARIATION_FEATURE) else {
        return false;
    };
    let mut chars = rest.chars();
    matches!((chars.next(), chars.next()), (Some(sep), Some(_)) if sep.is_whitespace())
}

/// Iterator adaptor applying a [`PreFilter`] to a stream of lines
pub struct FilteredLines<I> {
    lines: I,
    filter: PreFilter,
}

impl<I> FilteredLines<I> {
    pub fn stats(&self) -> PreFilterStats {
        self.filter.stats()
    }

    /// The unfiltered line source
    pub fn get_ref(&self) -> &I {
        &self.lines
    }
}

impl<I> Iterator for FilteredLines<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) if self.filter.accept(&line) => return Some(Ok(line)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Filter a stream of raw lines
pub fn filter_lines<I>(lines: I) -> FilteredLines<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    FilteredLines {
        lines,
        filter: PreFilter::new(),
    }
}

/// Lines of a division file, decoded leniently.
///
/// Division files are nominally ASCII but occasionally carry Latin-1 bytes
/// in free text. Invalid UTF-8 sequences become U+FFFD instead of failing the
/// whole file. Line terminators (`\n` or `\r\n`) are stripped.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
    replaced: u64,
}

impl<R> LossyLines<R> {
    /// Lines that contained invalid UTF-8
    pub fn replaced(&self) -> u64 {
        self.replaced
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                let line = match String::from_utf8_lossy(&self.buf) {
                    Cow::Borrowed(text) => text.to_string(),
                    Cow::Owned(text) => {
                        self.replaced += 1;
                        text
                    },
                };
                Some(Ok(line))
            },
            Err(e) => Some(Err(e)),
        }
    }
}

/// Split `reader` into leniently decoded lines
pub fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines {
        reader,
        buf: Vec::new(),
        replaced: 0,
    }
}
