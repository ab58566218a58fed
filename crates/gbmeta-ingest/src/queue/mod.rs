// Work tracking
//
// The ledger persists which source files were committed and with which
// fingerprint. The queue holds the files that still need work in this run.

pub mod ledger;
pub mod work_queue;

pub use ledger::{Ledger, LedgerEntry, LEDGER_FILE};
pub use work_queue::{plan, QueueItem, QueuePlan, WorkQueue};
