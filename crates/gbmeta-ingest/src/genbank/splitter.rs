// Record boundary detection

use std::io;

/// Every record starts on a line beginning with this marker
pub const RECORD_START: &str = "LOCUS";

/// Text of one record, newline terminated lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub text: String,

    /// 1-based position of the first line in the stream it was cut from
    pub first_line: usize,
}

impl RawRecord {
    pub fn size(&self) -> usize {
        self.text.len()
    }
}

/// Groups a line stream into [`RawRecord`]s at [`RECORD_START`] lines.
///
/// Lines before the first marker form a record of their own, which the parser
/// then rejects; in practice the pre-filter never lets such lines through.
pub struct RecordSplitter<I> {
    lines: I,
    buffer: String,
    buffer_start: usize,
    line_no: usize,
    done: bool,
}

impl<I> RecordSplitter<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            buffer: String::new(),
            buffer_start: 1,
            line_no: 0,
            done: false,
        }
    }

    /// The underlying line source
    pub fn get_ref(&self) -> &I {
        &self.lines
    }

    fn take_record(&mut self, next_start: usize) -> RawRecord {
        let record = RawRecord {
            text: std::mem::take(&mut self.buffer),
            first_line: self.buffer_start,
        };
        self.buffer_start = next_start;
        record
    }
}

impl<I> Iterator for RecordSplitter<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = io::Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    self.line_no += 1;
                    let line_no = self.line_no;
                    let record = if line.starts_with(RECORD_START) && !self.buffer.is_empty() {
                        Some(self.take_record(line_no))
                    } else {
                        None
                    };

                    self.buffer.push_str(&line);
                    self.buffer.push('\n');

                    if let Some(record) = record {
                        return Some(Ok(record));
                    }
                },
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                },
                None => {
                    self.done = true;
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let start = self.line_no + 1;
                    return Some(Ok(self.take_record(start)));
                },
            }
        }
    }
}
