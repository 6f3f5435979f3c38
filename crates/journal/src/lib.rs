//! Append-only, hash-chained event journal (spec.md §4.1).
//!
//! Every session-scoped fact the kernel, permission engine, and swarm core
//! produce is recorded here as one canonical-JSON line per event, chained by
//! SHA-256 so a tampered record is detectable by [`Journal::verify_integrity`]
//! without needing an external ledger.

mod disk;
mod error;
mod store;
mod subscribe;
mod types;
mod traits;

pub use disk::{classify, unlimited_probe, DiskPressureThresholds, DiskSpaceProbe};
pub use error::JournalError;
pub use store::FileJournal;
pub use subscribe::Subscription;
pub use traits::Journal;
pub use types::{DiskPressure, IntegrityReport, JournalEvent, JournalEventStream, ReadWindow};
