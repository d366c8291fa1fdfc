pub mod api_types;
pub mod client;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
use types::Project;

/// The remote side of the cache: a stateless source of project records.
///
/// Every call is a fresh network exchange; implementations neither cache nor
/// retry.
#[async_trait]
pub trait ProjectSource: Send + Sync + 'static {
  /// Non-archived projects, most recently updated first, without rows of
  /// `excluded_company_id`.
  async fn list_active_projects(
    &self,
    page_size: u32,
    excluded_company_id: i64,
  ) -> Result<Vec<Project>, RemoteError>;

  /// Non-archived projects at full field depth, ordered by id.
  async fn sync_active_projects(&self, page_size: u32) -> Result<Vec<Project>, RemoteError>;

  /// One project with its full field set, `None` when no row matches.
  async fn get_project_detail(&self, id: i64) -> Result<Option<Project>, RemoteError>;

  /// Raw response of a small listing, for connection diagnostics.
  async fn probe(&self) -> Result<Value, RemoteError>;
}
