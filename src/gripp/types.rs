//! Project records as Gripp returns them and as they are cached.
//!
//! Field names follow the wire format. Anything Gripp leaves out of a narrow
//! field selection deserializes to `None`/empty, so the dashboard listing and
//! the full-depth fetch share one type.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Gripp's date object, e.g. `{"date": "2024-03-01 00:00:00.000000", ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrippDate {
  pub date: String,
  #[serde(default)]
  pub timezone_type: Option<i64>,
  #[serde(default)]
  pub timezone: Option<String>,
}

impl GrippDate {
  /// Calendar day of this date, ignoring the time part.
  pub fn day(&self) -> Option<NaiveDate> {
    let day = self.date.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
  }
}

/// A `{id, searchname}` reference to another Gripp entity (phase, unit, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
  pub id: i64,
  #[serde(default)]
  pub searchname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRef {
  pub id: i64,
  #[serde(default)]
  pub searchname: String,
  #[serde(default)]
  pub discr: Option<String>,
}

/// Employees are referenced by string ids in Gripp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRef {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default)]
  pub searchname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub id: i64,
  #[serde(default)]
  pub name: String,
}

/// One line item of a project budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLine {
  pub id: i64,
  #[serde(rename = "_ordering", default, deserialize_with = "null_as_default")]
  pub ordering: i64,
  /// Budgeted quantity
  #[serde(default, deserialize_with = "null_as_default")]
  pub amount: f64,
  /// Quantity written so far, as a decimal string
  #[serde(default)]
  pub amountwritten: Option<String>,
  #[serde(default)]
  pub rowtype: Option<Reference>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub description: String,
  #[serde(default)]
  pub searchname: Option<String>,
  #[serde(default)]
  pub sellingprice: Option<String>,
  #[serde(default)]
  pub unit: Option<Reference>,
  #[serde(default)]
  pub product: Option<Reference>,
}

impl ProjectLine {
  pub fn written(&self) -> f64 {
    self
      .amountwritten
      .as_deref()
      .and_then(|s| s.trim().parse().ok())
      .unwrap_or(0.0)
  }
}

/// A Gripp project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: i64,
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(default)]
  pub number: Option<i64>,
  #[serde(default)]
  pub color: Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub archived: bool,
  #[serde(default = "zero_amount", deserialize_with = "amount_or_zero")]
  pub totalexclvat: String,
  #[serde(default = "zero_amount", deserialize_with = "amount_or_zero")]
  pub totalinclvat: String,
  #[serde(default)]
  pub phase: Option<Reference>,
  #[serde(default)]
  pub company: Option<CompanyRef>,
  #[serde(default)]
  pub deadline: Option<GrippDate>,
  #[serde(default)]
  pub startdate: Option<GrippDate>,
  #[serde(default)]
  pub deliverydate: Option<GrippDate>,
  #[serde(default)]
  pub enddate: Option<GrippDate>,
  #[serde(default)]
  pub updatedon: Option<GrippDate>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub templateset: Option<Reference>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub employees_starred: Vec<EmployeeRef>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub tags: Vec<Tag>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub projectlines: Vec<ProjectLine>,
  #[serde(default)]
  pub viewonlineurl: Option<String>,
}

impl Project {
  pub fn company_id(&self) -> Option<i64> {
    self.company.as_ref().map(|c| c.id)
  }

  pub fn belongs_to(&self, company_id: i64) -> bool {
    self.company_id() == Some(company_id)
  }

  /// Total excluding VAT as a number; unparsable totals count as zero.
  pub fn budget(&self) -> f64 {
    self.totalexclvat.trim().parse().unwrap_or(0.0)
  }

  pub fn deadline_day(&self) -> Option<NaiveDate> {
    self.deadline.as_ref().and_then(GrippDate::day)
  }
}

fn zero_amount() -> String {
  "0.00".to_string()
}

fn amount_or_zero<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Option<serde_json::Value> = Option::deserialize(deserializer)?;
  Ok(match v {
    Some(serde_json::Value::String(s)) if !s.is_empty() => s,
    Some(serde_json::Value::Number(n)) => n.to_string(),
    _ => zero_amount(),
  })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: serde::Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  match serde_json::Value::deserialize(deserializer)? {
    serde_json::Value::String(s) => Ok(s),
    serde_json::Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "expected string or number id, got {}",
      other
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_narrow_row_fills_defaults() {
    let project: Project = serde_json::from_value(json!({
      "id": 7,
      "name": null,
      "totalexclvat": "",
      "company": {"id": 12, "searchname": "Acme"}
    }))
    .unwrap();

    assert_eq!(project.name, "");
    assert_eq!(project.totalexclvat, "0.00");
    assert_eq!(project.totalinclvat, "0.00");
    assert!(project.projectlines.is_empty());
    assert!(project.belongs_to(12));
  }

  #[test]
  fn test_deadline_day() {
    let date = GrippDate {
      date: "2024-03-01 00:00:00.000000".to_string(),
      timezone_type: Some(3),
      timezone: Some("Europe/Amsterdam".to_string()),
    };
    assert_eq!(date.day(), NaiveDate::from_ymd_opt(2024, 3, 1));
  }

  #[test]
  fn test_employee_numeric_id() {
    let e: EmployeeRef = serde_json::from_value(json!({"id": 42, "searchname": "Jan"})).unwrap();
    assert_eq!(e.id, "42");
  }

  #[test]
  fn test_line_written_parses_decimal_string() {
    let line: ProjectLine = serde_json::from_value(json!({
      "id": 1,
      "amount": 10.0,
      "amountwritten": "2.50"
    }))
    .unwrap();
    assert_eq!(line.written(), 2.5);

    let unwritten: ProjectLine = serde_json::from_value(json!({"id": 2, "amount": 4})).unwrap();
    assert_eq!(unwritten.written(), 0.0);
  }
}
