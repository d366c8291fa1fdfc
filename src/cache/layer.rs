//! Cache layer that decides between cached data, background syncs and
//! blocking network fetches.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::storage::CacheStorage;
use super::traits::{CacheEntry, CacheResult, CachedEntity, Clock, SystemClock};
use crate::config::DEFAULT_EXCLUDED_COMPANY_ID;
use crate::error::{Error, Result};
use crate::gripp::types::Project;
use crate::gripp::ProjectSource;

/// Cache-entry key of the last connection probe.
pub const PROBE_KEY: &str = "api_probe";

/// Freshness thresholds and page sizes.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
  /// Serving cache older than this also starts a background sync
  pub sync_after: Duration,
  /// Period of the passive reload of a displayed list
  pub refresh_interval: Duration,
  /// Page size of the blocking fetch on an empty cache
  pub page_size: u32,
  /// Page size of the background sync
  pub sync_page_size: u32,
  /// Company whose projects are never shown
  pub excluded_company_id: i64,
}

impl Default for SyncPolicy {
  fn default() -> Self {
    Self {
      sync_after: Duration::from_secs(5 * 60),
      refresh_interval: Duration::from_secs(15 * 60),
      page_size: 250,
      sync_page_size: 50,
      excluded_company_id: DEFAULT_EXCLUDED_COMPANY_ID,
    }
  }
}

/// What a background sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  /// Remote data differed; this many projects were written
  Updated(usize),
  /// Remote data matched the cache; nothing was written
  Unchanged,
}

/// Cache layer that manages caching logic and network fetching.
///
/// This is the only component the presentation talks to. It owns shared
/// handles to the store and the remote source; clones share both.
pub struct CacheLayer<S: CacheStorage, R: ProjectSource> {
  storage: Arc<S>,
  remote: Arc<R>,
  policy: SyncPolicy,
  clock: Arc<dyn Clock>,
}

impl<S: CacheStorage, R: ProjectSource> CacheLayer<S, R> {
  pub fn new(storage: Arc<S>, remote: Arc<R>, policy: SyncPolicy) -> Self {
    Self {
      storage,
      remote,
      policy,
      clock: Arc::new(SystemClock),
    }
  }

  /// Use `clock` to compute cache age.
  #[cfg(test)]
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn policy(&self) -> &SyncPolicy {
    &self.policy
  }

  /// Whether cache last written at `last_modified` should be re-validated.
  /// A missing stamp counts as stale; a stamp in the future as fresh.
  fn is_stale(&self, last_modified: Option<DateTime<Utc>>) -> bool {
    match last_modified {
      Some(at) => match (self.clock.now() - at).to_std() {
        Ok(age) => age > self.policy.sync_after,
        Err(_) => false,
      },
      None => true,
    }
  }

  /// Cached projects minus the excluded company.
  fn visible(&self, records: Vec<CachedEntity<Project>>) -> Vec<Project> {
    let excluded = self.policy.excluded_company_id;
    records
      .into_iter()
      .map(|r| r.entity)
      .filter(|p| !p.belongs_to(excluded))
      .collect()
  }

  /// Active projects, cache first.
  ///
  /// 1. Cached projects exist: return them at once. If they are older than
  ///    `sync_after`, a background sync is spawned first; it is never awaited.
  /// 2. Otherwise fetch from Gripp, persist and return the result.
  /// 3. If that fetch fails, return whatever the cache holds by now, or the
  ///    remote error when it is still empty.
  pub async fn fetch_active_projects(&self) -> Result<CacheResult<Vec<Project>>> {
    let records = self.storage.get_all_records()?;
    // Rows past the sync page keep their older stamps
    let oldest = records.iter().map(|r| r.cached_at).min();
    let cached = self.visible(records);

    if !cached.is_empty() {
      let last_modified = self.storage.get_most_recent_modification()?;
      let stale = self.is_stale(last_modified);
      if stale {
        debug!(?last_modified, "Cache is stale, syncing in background");
        self.spawn_background_sync();
      }
      debug!(count = cached.len(), stale, ?oldest, "Serving projects from cache");
      return Ok(CacheResult::from_cache(cached, last_modified, stale));
    }

    debug!("No cached projects, fetching from Gripp");
    let fetched = self
      .remote
      .list_active_projects(self.policy.page_size, self.policy.excluded_company_id)
      .await;

    match fetched {
      Ok(projects) => {
        self.storage.save_records(&projects)?;
        info!(count = projects.len(), "Saved projects to cache");
        Ok(CacheResult::from_network(projects))
      }
      Err(e) => {
        let cached = self.visible(self.storage.get_all_records()?);
        if cached.is_empty() {
          return Err(e.into());
        }
        warn!(error = %e, count = cached.len(), "Gripp fetch failed, using cached projects");
        let last_modified = self.storage.get_most_recent_modification()?;
        Ok(CacheResult::offline(cached, last_modified))
      }
    }
  }

  /// Active projects without the cache metadata.
  pub async fn get_active_projects(&self) -> Result<Vec<Project>> {
    Ok(self.fetch_active_projects().await?.data)
  }

  /// Full detail of one project, always fetched from Gripp.
  pub async fn get_project_detail(&self, id: i64) -> Result<Project> {
    match self.remote.get_project_detail(id).await {
      Ok(Some(project)) => Ok(project),
      Ok(None) => Err(Error::DetailUnavailable {
        id,
        reason: "project not found".to_string(),
      }),
      Err(e) => {
        warn!(id, error = %e, "Failed to fetch project details");
        Err(Error::DetailUnavailable {
          id,
          reason: e.message().to_string(),
        })
      }
    }
  }

  /// Fetch a full-depth page and write it only if it differs from the cache.
  ///
  /// Comparison is over the whole payload of every visible project, so an
  /// unchanged remote leaves the write stamps, and thus the cache age, alone.
  pub async fn background_sync(&self) -> Result<SyncOutcome> {
    let mut fetched = self
      .remote
      .sync_active_projects(self.policy.sync_page_size)
      .await?;
    fetched.retain(|p| !p.belongs_to(self.policy.excluded_company_id));
    fetched.sort_by_key(|p| p.id);

    // Stored rows come back ordered by id
    let cached = self.visible(self.storage.get_all_records()?);

    if fetched == cached {
      debug!("Background sync: no changes detected");
      return Ok(SyncOutcome::Unchanged);
    }

    self.storage.save_records(&fetched)?;
    info!(count = fetched.len(), "Background sync: changes detected, cache updated");
    Ok(SyncOutcome::Updated(fetched.len()))
  }

  /// Run [`Self::background_sync`] as a detached task. Its errors are logged
  /// and dropped; nothing reaches the caller.
  pub fn spawn_background_sync(&self) -> JoinHandle<()> {
    let layer = self.clone();
    tokio::spawn(async move {
      if let Err(e) = layer.background_sync().await {
        warn!(error = %e, "Background sync failed");
      }
    })
  }

  /// Drop everything cached and fetch from Gripp.
  pub async fn force_refresh(&self) -> Result<CacheResult<Vec<Project>>> {
    self.storage.clear_all()?;
    info!("Cache cleared, refreshing from Gripp");
    self.fetch_active_projects().await
  }

  /// Empty the whole cache.
  pub async fn clear_cache(&self) -> Result<()> {
    self.storage.clear_all()?;
    Ok(())
  }

  /// Empty only the generic cache entries.
  pub async fn clear_cache_entries(&self) -> Result<()> {
    self.storage.clear_cache_entries()?;
    Ok(())
  }

  /// Probe the Gripp connection and keep the raw reply as a cache entry.
  pub async fn probe(&self) -> Result<Value> {
    let body = self.remote.probe().await?;
    self
      .storage
      .set_cache_entry(PROBE_KEY, &body, self.clock.now())?;
    Ok(body)
  }

  /// Reply of the last successful probe.
  pub fn last_probe(&self) -> Result<Option<CacheEntry<Value>>> {
    Ok(self.storage.get_cache_entry(PROBE_KEY)?)
  }
}

impl<S: CacheStorage, R: ProjectSource> Clone for CacheLayer<S, R> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      remote: Arc::clone(&self.remote),
      policy: self.policy.clone(),
      clock: Arc::clone(&self.clock),
    }
  }
}
