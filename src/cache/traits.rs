//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of "now" for write stamps and cache age.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A cached record with the local time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntity<T> {
  pub entity: T,
  pub cached_at: DateTime<Utc>,
}

/// A generic keyed value in the cache-entry collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub key: String,
  pub value: T,
  pub timestamp: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Most recent write stamp of the cached data (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: Option<DateTime<Utc>>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at,
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, old enough that a background sync was started
  CacheStale,
  /// Network fetch failed, serving cached data
  Offline,
}

impl CacheSource {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Network => "network",
      Self::CacheFresh => "cache",
      Self::CacheStale => "cache (syncing)",
      Self::Offline => "cache (offline)",
    }
  }
}
