//! Timer-driven reload of the project list.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use super::layer::CacheLayer;
use super::storage::CacheStorage;
use super::traits::CacheResult;
use crate::gripp::types::Project;
use crate::gripp::ProjectSource;

/// Outcome of one passive reload
#[derive(Debug)]
pub enum RefreshEvent {
  Loaded(CacheResult<Vec<Project>>),
  Failed(String),
}

/// Reloads the active projects every `refresh_interval`, starting at once.
///
/// The timer task lives exactly as long as this handle: dropping it (or
/// calling [`PassiveRefresh::stop`]) aborts the task.
pub struct PassiveRefresh {
  rx: mpsc::UnboundedReceiver<RefreshEvent>,
  task: JoinHandle<()>,
}

impl PassiveRefresh {
  pub fn start<S: CacheStorage, R: ProjectSource>(layer: CacheLayer<S, R>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let period = layer.policy().refresh_interval;

    let task = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        ticker.tick().await;
        let event = match layer.fetch_active_projects().await {
          Ok(result) => RefreshEvent::Loaded(result),
          Err(e) => {
            warn!(error = %e, "Passive refresh failed");
            RefreshEvent::Failed(e.to_string())
          }
        };
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx, task }
  }

  /// Receive the next reload
  pub async fn next(&mut self) -> Option<RefreshEvent> {
    self.rx.recv().await
  }

  pub fn stop(self) {}
}

impl Drop for PassiveRefresh {
  fn drop(&mut self) {
    self.task.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::layer::SyncPolicy;
  use crate::cache::storage::SqliteStorage;
  use crate::cache::testing::{project, FakeSource, Reply};
  use crate::cache::CacheSource;
  use std::sync::Arc;
  use std::time::Duration;

  fn layer(remote: Arc<FakeSource>) -> CacheLayer<SqliteStorage, FakeSource> {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let policy = SyncPolicy {
      refresh_interval: Duration::from_secs(15 * 60),
      ..SyncPolicy::default()
    };
    CacheLayer::new(storage, remote, policy)
  }

  #[tokio::test(start_paused = true)]
  async fn test_reloads_every_interval() {
    let remote = Arc::new(FakeSource::new(Reply::Rows(vec![project(1, 10)])));
    let mut refresh = PassiveRefresh::start(layer(remote.clone()));

    match refresh.next().await {
      Some(RefreshEvent::Loaded(result)) => assert_eq!(result.source, CacheSource::Network),
      other => panic!("unexpected {:?}", other),
    }

    // Paused time skips ahead to the next tick
    match refresh.next().await {
      Some(RefreshEvent::Loaded(result)) => {
        assert_eq!(result.source, CacheSource::CacheFresh);
        assert_eq!(result.data.len(), 1);
      }
      other => panic!("unexpected {:?}", other),
    }
    assert_eq!(remote.list_calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failures_are_reported_not_fatal() {
    let remote = Arc::new(FakeSource::new(Reply::Fail("down")));
    let mut refresh = PassiveRefresh::start(layer(remote.clone()));

    assert!(matches!(refresh.next().await, Some(RefreshEvent::Failed(_))));
    remote.set_list(Reply::Rows(vec![project(2, 10)]));
    assert!(matches!(refresh.next().await, Some(RefreshEvent::Loaded(_))));
  }

  #[tokio::test(start_paused = true)]
  async fn test_drop_cancels_timer() {
    let remote = Arc::new(FakeSource::new(Reply::Fail("down")));
    let mut refresh = PassiveRefresh::start(layer(remote.clone()));
    refresh.next().await;
    drop(refresh);

    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    assert_eq!(remote.list_calls(), 1);
  }
}
