// Field values and their load-file encoding

use std::borrow::Cow;
use std::fmt::Write;

/// Column separator in load files
pub const FIELD_DELIM: char = '\t';

/// Row terminator in load files
pub const LINE_DELIM: char = '\n';

/// Encoding of a missing value
pub const NULL_MARKER: &str = "\\N";

/// One nullable column value of a table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Null,
    Text(Cow<'a, str>),
    Bool(bool),
    Int(i64),
}

impl FieldValue<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Append the encoded value to `out`
    pub fn encode_into(&self, out: &mut String) {
        match self {
            FieldValue::Null => out.push_str(NULL_MARKER),
            FieldValue::Text(s) if s.contains('\\') => out.push_str(&s.replace('\\', "\\\\")),
            FieldValue::Text(s) => out.push_str(s),
            FieldValue::Bool(b) => out.push(if *b { '1' } else { '0' }),
            FieldValue::Int(i) => {
                let _ = write!(out, "{}", i);
            },
        }
    }
}

/// Encode a row as one load-file line without the terminator.
/// Returns `None` when every field is null.
pub fn encode_row(fields: &[FieldValue<'_>]) -> Option<String> {
    if fields.iter().all(FieldValue::is_null) {
        return None;
    }

    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(FIELD_DELIM);
        }
        field.encode_into(&mut line);
    }
    Some(line)
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(s: &'a str) -> Self {
        FieldValue::Text(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(s: &'a String) -> Self {
        FieldValue::Text(Cow::Borrowed(s.as_str()))
    }
}

impl From<String> for FieldValue<'_> {
    fn from(s: String) -> Self {
        FieldValue::Text(Cow::Owned(s))
    }
}

impl<'a> From<Option<&'a str>> for FieldValue<'a> {
    fn from(s: Option<&'a str>) -> Self {
        s.map_or(FieldValue::Null, FieldValue::from)
    }
}

impl From<bool> for FieldValue<'_> {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

macro_rules! int_field {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue<'_> {
                fn from(i: $t) -> Self {
                    FieldValue::Int(i64::from(i))
                }
            }
        )*
    };
}

int_field!(u8, i32, u32, i64);
