//! Metrics Keeper - counter and gauge store with durable backups
//!
//! This library provides the in-memory metric repository, its change
//! notification, the file-backed backup manager and the HTTP API that
//! fronts them.

pub mod api;
pub mod backup;
pub mod config;
pub mod error;
pub mod metric;
pub mod repository;
pub mod telemetry;
pub mod util;

pub use config::Config;
pub use error::{Result, StoreError};

/// Server version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
