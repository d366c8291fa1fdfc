//! Request and response envelopes of Gripp's batched JSON-RPC endpoint.
//!
//! A call is an array of `{method, params, id}` envelopes; the reply is a
//! parallel array of `{id, result, error}` envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::RemoteError;

/// Fields the dashboard listing needs.
pub const DASHBOARD_FIELDS: &[&str] = &[
  "project.id",
  "project.name",
  "project.number",
  "project.color",
  "project.totalexclvat",
  "project.totalinclvat",
  "project.deadline",
  "project.phase",
  "project.company",
  "project.projectlines",
  "project.employees_starred",
  "project.tags",
];

/// Full field depth used by the background sync.
pub const FULL_FIELDS: &[&str] = &["project.*", "project.tags.*"];

#[derive(Debug, Serialize)]
pub struct ApiRequest {
  pub method: &'static str,
  pub params: Value,
  pub id: u64,
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ApiFilter {
  pub field: &'static str,
  pub operator: &'static str,
  pub value: Value,
}

impl ApiFilter {
  pub fn equals(field: &'static str, value: impl Into<Value>) -> Self {
    Self {
      field,
      operator: "equals",
      value: value.into(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiOrdering {
  pub field: &'static str,
  pub direction: &'static str,
}

/// Options object of a `project.get` call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiOptions {
  pub paging: ApiPaging,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub orderings: Vec<ApiOrdering>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub fields: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiPaging {
  pub firstresult: u32,
  pub maxresults: u32,
}

impl ApiOptions {
  pub fn page(maxresults: u32) -> Self {
    Self {
      paging: ApiPaging {
        firstresult: 0,
        maxresults,
      },
      orderings: Vec::new(),
      fields: Vec::new(),
    }
  }

  pub fn order_by(mut self, field: &'static str, direction: &'static str) -> Self {
    self.orderings.push(ApiOrdering { field, direction });
    self
  }

  pub fn fields(mut self, fields: &[&'static str]) -> Self {
    self.fields = fields.to_vec();
    self
  }
}

/// Build the single-call batch for `project.get`.
pub fn project_get(filters: &[ApiFilter], options: &ApiOptions) -> Vec<ApiRequest> {
  vec![ApiRequest {
    method: "project.get",
    params: json!([filters, options]),
    id: 1,
  }]
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiResponse {
  #[serde(default)]
  pub result: Option<ApiRows>,
  #[serde(default)]
  pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRows {
  #[serde(default)]
  pub rows: Vec<Value>,
  #[serde(default)]
  pub count: Option<u64>,
  #[serde(default)]
  pub more_items_in_collection: Option<bool>,
}

/// Take the first envelope of a reply, turning every way it can be unusable
/// into a [`RemoteError`].
pub fn first_result(body: Vec<ApiResponse>) -> Result<ApiRows, RemoteError> {
  let first = body
    .into_iter()
    .next()
    .ok_or_else(|| RemoteError::new("Gripp returned an empty response"))?;

  if let Some(error) = first.error.filter(|e| !e.is_null()) {
    let message = match error {
      Value::String(s) => s,
      other => other.to_string(),
    };
    return Err(RemoteError::new(format!("Gripp API error: {}", message)));
  }

  first
    .result
    .ok_or_else(|| RemoteError::new("Gripp response has no result"))
}
