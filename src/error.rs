//! Error types for the cache and the remote client.

use thiserror::Error;

/// Errors raised by the persistent store.
#[derive(Debug, Error)]
pub enum StorageError {
  /// SQLite rejected the operation
  #[error("SQLite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// A stored payload could not be (de)serialized
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// The connection mutex was poisoned by a panicking holder
  #[error("Lock poisoned: {0}")]
  LockPoisoned(String),

  /// A stored timestamp could not be parsed
  #[error("Invalid timestamp '{0}'")]
  Timestamp(String),

  /// Filesystem error while preparing the database location
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Any failure talking to Gripp: transport, HTTP status, application error
/// or an unusable response body. Callers only ever see the message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteError {
  message: String,
}

impl RemoteError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl From<reqwest::Error> for RemoteError {
  fn from(e: reqwest::Error) -> Self {
    Self::new(format!("Gripp request failed: {}", e))
  }
}

/// Errors surfaced by the cache layer to its callers.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Storage failure: {0}")]
  Storage(#[from] StorageError),

  #[error("Remote failure: {0}")]
  Remote(#[from] RemoteError),

  /// Detail lookup found nothing, or the lookup itself failed
  #[error("Project {id} is unavailable: {reason}")]
  DetailUnavailable { id: i64, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
