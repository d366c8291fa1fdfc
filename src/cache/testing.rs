//! Fixtures shared by the cache tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::traits::Clock;
use crate::error::RemoteError;
use crate::gripp::types::{CompanyRef, Project};
use crate::gripp::ProjectSource;

/// Clock that only moves when told to.
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
  fn default() -> Self {
    Self {
      now: Mutex::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()),
    }
  }
}

impl ManualClock {
  pub fn advance(&self, by: Duration) {
    *self.now.lock().unwrap() += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap()
  }
}

pub fn project(id: i64, company_id: i64) -> Project {
  serde_json::from_value(json!({
    "id": id,
    "name": format!("Project {}", id),
    "totalexclvat": "1000.00",
  }))
  .map(|mut p: Project| {
    p.company = Some(CompanyRef {
      id: company_id,
      searchname: format!("Company {}", company_id),
      discr: None,
    });
    p
  })
  .unwrap()
}

/// Scripted answer of a [`FakeSource`] call.
#[derive(Clone)]
pub enum Reply {
  Rows(Vec<Project>),
  Fail(&'static str),
  /// Never resolves
  Hang,
}

impl Reply {
  async fn resolve(self) -> Result<Vec<Project>, RemoteError> {
    match self {
      Reply::Rows(rows) => Ok(rows),
      Reply::Fail(message) => Err(RemoteError::new(message)),
      Reply::Hang => std::future::pending().await,
    }
  }
}

/// In-process stand-in for Gripp that counts its calls.
pub struct FakeSource {
  list: Mutex<Reply>,
  sync: Mutex<Reply>,
  detail: Mutex<Reply>,
  pub list_calls: AtomicUsize,
  pub sync_calls: AtomicUsize,
}

impl FakeSource {
  pub fn new(list: Reply) -> Self {
    Self {
      list: Mutex::new(list),
      sync: Mutex::new(Reply::Fail("sync not scripted")),
      detail: Mutex::new(Reply::Rows(Vec::new())),
      list_calls: AtomicUsize::new(0),
      sync_calls: AtomicUsize::new(0),
    }
  }

  pub fn with_sync(self, sync: Reply) -> Self {
    *self.sync.lock().unwrap() = sync;
    self
  }

  pub fn with_detail(self, detail: Reply) -> Self {
    *self.detail.lock().unwrap() = detail;
    self
  }

  pub fn set_list(&self, list: Reply) {
    *self.list.lock().unwrap() = list;
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn sync_calls(&self) -> usize {
    self.sync_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ProjectSource for FakeSource {
  async fn list_active_projects(
    &self,
    _page_size: u32,
    excluded_company_id: i64,
  ) -> Result<Vec<Project>, RemoteError> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    let reply = self.list.lock().unwrap().clone();
    let mut rows = reply.resolve().await?;
    rows.retain(|p| !p.belongs_to(excluded_company_id));
    Ok(rows)
  }

  async fn sync_active_projects(&self, _page_size: u32) -> Result<Vec<Project>, RemoteError> {
    self.sync_calls.fetch_add(1, Ordering::SeqCst);
    let reply = self.sync.lock().unwrap().clone();
    reply.resolve().await
  }

  async fn get_project_detail(&self, id: i64) -> Result<Option<Project>, RemoteError> {
    let reply = self.detail.lock().unwrap().clone();
    let rows = reply.resolve().await?;
    Ok(rows.into_iter().find(|p| p.id == id))
  }

  async fn probe(&self) -> Result<Value, RemoteError> {
    let reply = self.list.lock().unwrap().clone();
    let rows = reply.resolve().await?;
    let count = rows.len();
    Ok(json!([{"id": 1, "result": {"rows": rows, "count": count}, "error": null}]))
  }
}
