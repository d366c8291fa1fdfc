//! Local project cache and the sync policy around it.
//!
//! This module provides the caching engine of the dashboard:
//! - Persists projects and generic cache entries in SQLite
//! - Serves cached projects immediately, re-validating stale ones in the background
//! - Blocks on Gripp only when nothing is cached
//! - Falls back to cached data when Gripp is unreachable

mod layer;
mod refresh;
mod storage;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use layer::{CacheLayer, SyncOutcome, SyncPolicy};
pub use refresh::{PassiveRefresh, RefreshEvent};
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource};
