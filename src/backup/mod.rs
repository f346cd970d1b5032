//! Backup and restore
//!
//! File-backed durability for the in-memory repository.

mod atomic;
mod manager;

pub use atomic::write_atomic;
pub use manager::{BackupManager, BackupState, RestoreSummary};
