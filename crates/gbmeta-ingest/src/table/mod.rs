// Load-file output
//
// Rows are buffered per table and worker, spilled to a worker-private temp
// file, and appended to the shared master file only once the source file
// that produced them has been processed completely.

pub mod locks;
pub mod registry;
pub mod set;
pub mod value;
pub mod writer;

pub use locks::{CommitLocks, NamedLocks};
pub use registry::KeyRegistry;
pub use set::{TableKind, TableSet};
pub use value::FieldValue;
pub use writer::{BufferedTableWriter, BYTE_THRESHOLD};
