// GenBank flat-file parsing
//
// Stages, in the order a worker applies them:
//   prefilter - drops sequence data, translations and variation features
//   splitter  - cuts the filtered stream into LOCUS-delimited records
//   parser    - turns one record into a ParsedRecord
//   tables    - projects a ParsedRecord onto the six output tables

pub mod models;
pub mod parser;
pub mod prefilter;
pub mod splitter;
pub mod tables;
pub mod tags;

pub use models::{DbXRef, Journal, ParsedRecord};
pub use parser::{RecordError, RecordParser};
pub use prefilter::{filter_lines, lossy_lines, FilteredLines, LossyLines, PreFilter, PreFilterStats};
pub use splitter::{RawRecord, RecordSplitter, RECORD_START};
pub use tables::{project, Table};
pub use tags::{split_tags, LogicalBlockMap};
