use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::RemoteError;
use crate::gripp::api_types::{
  first_result, project_get, ApiFilter, ApiOptions, ApiRequest, ApiResponse, ApiRows,
  DASHBOARD_FIELDS, FULL_FIELDS,
};
use crate::gripp::types::Project;
use crate::gripp::ProjectSource;

/// Path of the JSON-RPC endpoint below the configured base URL.
const API_PATH: &str = "public/api3.php";

/// Page size of the connection probe.
const PROBE_PAGE_SIZE: u32 = 50;

/// Gripp API client
#[derive(Clone)]
pub struct GrippClient {
  http: reqwest::Client,
  endpoint: Url,
}

impl GrippClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(&config.gripp.url, &token)
  }

  /// Build a client for `base_url` authenticating with a bearer `token`.
  pub fn with_token(base_url: &str, token: &str) -> Result<Self> {
    let mut base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid Gripp URL {}: {}", base_url, e))?;
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }
    let endpoint = base
      .join(API_PATH)
      .map_err(|e| eyre!("Invalid Gripp URL {}: {}", base_url, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|e| eyre!("Invalid Gripp API token: {}", e))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, endpoint })
  }

  /// Post a batch and return the decoded body, whatever it contains.
  async fn send_raw(&self, batch: &[ApiRequest]) -> Result<Value, RemoteError> {
    debug!(endpoint = %self.endpoint, method = ?batch.first().map(|r| r.method), "Gripp request");

    let response = self.http.post(self.endpoint.clone()).json(batch).send().await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(RemoteError::new(format!(
        "Gripp returned HTTP {}: {}",
        status,
        body.trim()
      )));
    }

    response
      .json::<Value>()
      .await
      .map_err(|e| RemoteError::new(format!("Failed to decode Gripp response: {}", e)))
  }

  async fn send(&self, batch: &[ApiRequest]) -> Result<ApiRows, RemoteError> {
    let body = self.send_raw(batch).await?;
    let envelopes: Vec<ApiResponse> = serde_json::from_value(body)
      .map_err(|e| RemoteError::new(format!("Malformed Gripp response: {}", e)))?;
    let rows = first_result(envelopes)?;
    debug!(
      rows = rows.rows.len(),
      count = ?rows.count,
      more = ?rows.more_items_in_collection,
      "Gripp response"
    );
    Ok(rows)
  }

  async fn get_projects(
    &self,
    filters: &[ApiFilter],
    options: &ApiOptions,
  ) -> Result<Vec<Project>, RemoteError> {
    let rows = self.send(&project_get(filters, options)).await?;
    rows
      .rows
      .into_iter()
      .map(|row| {
        serde_json::from_value(row)
          .map_err(|e| RemoteError::new(format!("Failed to parse project: {}", e)))
      })
      .collect()
  }
}

fn active_filter() -> Vec<ApiFilter> {
  vec![ApiFilter::equals("project.archived", false)]
}

#[async_trait]
impl ProjectSource for GrippClient {
  async fn list_active_projects(
    &self,
    page_size: u32,
    excluded_company_id: i64,
  ) -> Result<Vec<Project>, RemoteError> {
    let options = ApiOptions::page(page_size)
      .order_by("project.updatedon", "desc")
      .fields(DASHBOARD_FIELDS);

    let mut projects = self.get_projects(&active_filter(), &options).await?;
    projects.retain(|p| !p.belongs_to(excluded_company_id));
    Ok(projects)
  }

  async fn sync_active_projects(&self, page_size: u32) -> Result<Vec<Project>, RemoteError> {
    let options = ApiOptions::page(page_size)
      .order_by("project.id", "asc")
      .fields(FULL_FIELDS);
    self.get_projects(&active_filter(), &options).await
  }

  async fn get_project_detail(&self, id: i64) -> Result<Option<Project>, RemoteError> {
    let filters = [ApiFilter::equals("project.id", id)];
    let projects = self.get_projects(&filters, &ApiOptions::page(1)).await?;
    Ok(projects.into_iter().next())
  }

  async fn probe(&self) -> Result<Value, RemoteError> {
    let options = ApiOptions::page(PROBE_PAGE_SIZE).order_by("project.id", "asc");
    let body = self.send_raw(&project_get(&active_filter(), &options)).await?;

    // Surface embedded errors the same way the typed calls do.
    let envelopes: Vec<ApiResponse> = serde_json::from_value(body.clone())
      .map_err(|e| RemoteError::new(format!("Malformed Gripp response: {}", e)))?;
    first_result(envelopes)?;
    Ok(body)
  }
}
