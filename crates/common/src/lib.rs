//! Digest Common Library
//!
//! Shared code for the digest read service including:
//! - Row store access and positional row mapping
//! - Read models and their materialization from rows
//! - Ranking of stories and timelines
//! - The snapshot cache and its refresh scheduler
//! - Error types, configuration, metrics

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod materialize;
pub mod metrics;
pub mod models;
pub mod rank;
pub mod text;

// Re-export commonly used types
pub use cache::{DigestCache, RefreshHandle, RefreshScheduler, RefreshTrigger};
pub use config::AppConfig;
pub use db::{DbPool, Repository, RowStore};
#[cfg(any(test, feature = "test-util"))]
pub use db::MemoryStore;
pub use errors::{AppError, Result};
pub use materialize::Materializer;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
