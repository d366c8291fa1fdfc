//! Filtering, sorting and summary figures over a project list.
//!
//! Pure functions over what the cache layer returns; nothing here touches
//! storage or the network.

use chrono::{Datelike, Duration, NaiveDate};
use clap::ValueEnum;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::gripp::types::{Project, ProjectLine};

/// Name marker of Gripp's own internal projects and lines, which are never shown.
const INTERNAL_MARKER: &str = "Gripp Intern";

/// Row type of the lines that open a new group in a project budget.
const GROUP_LABEL: &str = "GROEPLABEL";

/// Line Gripp adds to round off a group total.
const ROUNDING_MARKER: &str = "Groepstotaal afronding";

/// Section of the lines that precede the first group label.
const UNGROUPED_LABEL: &str = "Overig";

fn percent(written: f64, budgeted: f64) -> f64 {
  if budgeted > 0.0 {
    written / budgeted * 100.0
  } else {
    0.0
  }
}

pub fn is_internal(project: &Project) -> bool {
  project.name.contains(INTERNAL_MARKER)
}

pub fn written_hours(project: &Project) -> f64 {
  project.projectlines.iter().map(|l| l.written()).sum()
}

pub fn budgeted_hours(project: &Project) -> f64 {
  project.projectlines.iter().map(|l| l.amount).sum()
}

/// Share of written hours versus budgeted hours, in percent.
/// Zero when nothing is budgeted.
pub fn progress(project: &Project) -> f64 {
  percent(written_hours(project), budgeted_hours(project))
}

pub fn line_progress(line: &ProjectLine) -> f64 {
  percent(line.written(), line.amount)
}

fn line_name(line: &ProjectLine) -> &str {
  line.searchname.as_deref().unwrap_or("")
}

/// Display label of a line: its description, else its name.
pub fn line_label(line: &ProjectLine) -> &str {
  if line.description.is_empty() {
    line_name(line)
  } else {
    &line.description
  }
}

fn is_group_label(line: &ProjectLine) -> bool {
  line
    .rowtype
    .as_ref()
    .is_some_and(|r| r.searchname.contains(GROUP_LABEL))
}

/// `"Groep Design"` is shown as `"Design"`.
fn section_title(name: &str) -> String {
  match name.get(..5) {
    Some(head) if head.eq_ignore_ascii_case("groep") && name[5..].starts_with(char::is_whitespace) => {
      name[5..].trim_start().to_string()
    }
    _ => name.to_string(),
  }
}

/// Lines under one group label, in budget order.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSection<'a> {
  pub title: String,
  pub lines: Vec<&'a ProjectLine>,
}

/// Split the budget at its group-label rows. Lines before the first label
/// land in an "Overig" section; internal lines are left out.
pub fn line_sections(project: &Project) -> Vec<LineSection<'_>> {
  let mut lines: Vec<&ProjectLine> = project
    .projectlines
    .iter()
    .filter(|l| !line_name(l).contains(INTERNAL_MARKER))
    .collect();
  lines.sort_by_key(|l| l.ordering);

  let mut sections: Vec<LineSection> = Vec::new();
  for line in lines {
    if is_group_label(line) {
      sections.push(LineSection {
        title: section_title(line_name(line)),
        lines: Vec::new(),
      });
      continue;
    }
    match sections.last_mut() {
      Some(section) => section.lines.push(line),
      None => sections.push(LineSection {
        title: UNGROUPED_LABEL.to_string(),
        lines: vec![line],
      }),
    }
  }
  sections
}

/// Hours of every line sold as the same product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductGroup<'a> {
  pub name: String,
  pub written: f64,
  pub budgeted: f64,
  pub lines: Vec<&'a ProjectLine>,
}

impl ProductGroup<'_> {
  pub fn progress(&self) -> f64 {
    percent(self.written, self.budgeted)
  }
}

/// Lines aggregated per product, largest budget first.
///
/// The product is the line name up to its first `" ("`, so `"Design (Fixed)"`
/// and `"Design"` add up. Group labels, internal lines and rounding lines do
/// not count.
pub fn product_groups(project: &Project) -> Vec<ProductGroup<'_>> {
  let mut groups: Vec<ProductGroup> = Vec::new();

  for line in &project.projectlines {
    let name = line_name(line);
    if is_group_label(line) || name.contains(INTERNAL_MARKER) || name.contains(ROUNDING_MARKER) {
      continue;
    }
    let product = name.split(" (").next().unwrap_or(name);

    match groups.iter_mut().find(|g| g.name == product) {
      Some(group) => {
        group.written += line.written();
        group.budgeted += line.amount;
        group.lines.push(line);
      }
      None => groups.push(ProductGroup {
        name: product.to_string(),
        written: line.written(),
        budgeted: line.amount,
        lines: vec![line],
      }),
    }
  }

  groups.sort_by(|a, b| b.budgeted.total_cmp(&a.budgeted));
  groups
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DeadlinePeriod {
  #[default]
  All,
  ThisWeek,
  ThisMonth,
  NextMonth,
  Overdue,
}

impl DeadlinePeriod {
  pub fn contains(&self, deadline: NaiveDate, today: NaiveDate) -> bool {
    match self {
      Self::All => true,
      Self::ThisWeek => {
        let days_left = 7 - i64::from(today.weekday().num_days_from_sunday());
        deadline >= today && deadline <= today + Duration::days(days_left)
      }
      Self::ThisMonth => same_month(deadline, today) && deadline >= today,
      Self::NextMonth => {
        let next = if today.month() == 12 {
          NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
        } else {
          NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
        };
        next.is_some_and(|next| same_month(deadline, next))
      }
      Self::Overdue => deadline < today,
    }
  }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
  a.year() == b.year() && a.month() == b.month()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ProgressRange {
  #[default]
  All,
  #[value(name = "0-25")]
  UpTo25,
  #[value(name = "25-50")]
  UpTo50,
  #[value(name = "50-75")]
  UpTo75,
  #[value(name = "75-100")]
  UpTo100,
  #[value(name = "100+")]
  Over100,
}

impl ProgressRange {
  /// Half-open `[min, max)` bounds in percent.
  fn bounds(&self) -> (f64, f64) {
    match self {
      Self::All => (0.0, f64::INFINITY),
      Self::UpTo25 => (0.0, 25.0),
      Self::UpTo50 => (25.0, 50.0),
      Self::UpTo75 => (50.0, 75.0),
      Self::UpTo100 => (75.0, 100.0),
      Self::Over100 => (100.0, f64::INFINITY),
    }
  }

  pub fn contains(&self, progress: f64) -> bool {
    if *self == Self::All {
      return true;
    }
    let (min, max) = self.bounds();
    progress >= min && progress < max
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
  /// Most urgent deadline first
  #[default]
  DeadlineAsc,
  DeadlineDesc,
  ProgressAsc,
  ProgressDesc,
  /// Highest budget first
  BudgetDesc,
  BudgetAsc,
  NameAsc,
  NameDesc,
}

impl SortOrder {
  pub fn compare(&self, a: &Project, b: &Project) -> Ordering {
    match self {
      Self::DeadlineAsc => by_deadline(a, b, false),
      Self::DeadlineDesc => by_deadline(a, b, true),
      Self::ProgressAsc => progress(a).total_cmp(&progress(b)),
      Self::ProgressDesc => progress(b).total_cmp(&progress(a)),
      Self::BudgetDesc => b.budget().total_cmp(&a.budget()),
      Self::BudgetAsc => a.budget().total_cmp(&b.budget()),
      Self::NameAsc => by_name(a, b),
      Self::NameDesc => by_name(b, a),
    }
  }
}

/// Projects without a deadline sort last in both directions.
fn by_deadline(a: &Project, b: &Project, descending: bool) -> Ordering {
  match (a.deadline_day(), b.deadline_day()) {
    (None, None) => Ordering::Equal,
    (None, Some(_)) => Ordering::Greater,
    (Some(_), None) => Ordering::Less,
    (Some(x), Some(y)) if descending => y.cmp(&x),
    (Some(x), Some(y)) => x.cmp(&y),
  }
}

fn by_name(a: &Project, b: &Project) -> Ordering {
  a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

/// Selection criteria of the dashboard list. Empty strings and `All`
/// variants select everything.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
  pub client: Option<String>,
  pub starred_employee: Option<String>,
  pub phase: Option<String>,
  pub deadline: DeadlinePeriod,
  pub progress: ProgressRange,
}

impl ProjectFilter {
  pub fn matches(&self, project: &Project, today: NaiveDate) -> bool {
    if is_internal(project) {
      return false;
    }

    if let Some(client) = self.client.as_deref() {
      if project.company.as_ref().map(|c| c.searchname.as_str()) != Some(client) {
        return false;
      }
    }

    if let Some(employee) = self.starred_employee.as_deref() {
      if !project.employees_starred.iter().any(|e| e.searchname == employee) {
        return false;
      }
    }

    if let Some(phase) = self.phase.as_deref() {
      if project.phase.as_ref().map(|p| p.searchname.as_str()) != Some(phase) {
        return false;
      }
    }

    // Projects without a deadline are not judged by the period
    if let Some(deadline) = project.deadline_day() {
      if !self.deadline.contains(deadline, today) {
        return false;
      }
    }

    self.progress.contains(progress(project))
  }

  /// Matching projects ordered by `sort`.
  pub fn apply<'a>(
    &self,
    projects: &'a [Project],
    sort: SortOrder,
    today: NaiveDate,
  ) -> Vec<&'a Project> {
    let mut selected: Vec<&Project> = projects
      .iter()
      .filter(|p| self.matches(p, today))
      .collect();
    selected.sort_by(|a, b| sort.compare(a, b));
    selected
  }
}

/// Distinct values available to each filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
  pub clients: Vec<String>,
  pub starred_employees: Vec<String>,
  pub phases: Vec<String>,
}

impl FilterOptions {
  pub fn collect(projects: &[Project]) -> Self {
    let clients: BTreeSet<String> = projects
      .iter()
      .filter_map(|p| p.company.as_ref().map(|c| c.searchname.clone()))
      .filter(|s| !s.is_empty())
      .collect();
    let starred_employees: BTreeSet<String> = projects
      .iter()
      .flat_map(|p| p.employees_starred.iter().map(|e| e.searchname.clone()))
      .collect();
    let phases: BTreeSet<String> = projects
      .iter()
      .filter_map(|p| p.phase.as_ref().map(|ph| ph.searchname.clone()))
      .filter(|s| !s.is_empty())
      .collect();

    Self {
      clients: clients.into_iter().collect(),
      starred_employees: starred_employees.into_iter().collect(),
      phases: phases.into_iter().collect(),
    }
  }
}

/// Headline figures of a project list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
  pub total: usize,
  pub overdue: usize,
  pub total_budget: f64,
  /// Written more than budgeted
  pub over_budget: usize,
  /// Between 80% and 100% of the budget written
  pub nearing_limit: usize,
  pub active_employees: usize,
  pub average_value: f64,
  pub deadline_percentage: f64,
}

impl DashboardStats {
  pub fn compute<'a>(projects: impl IntoIterator<Item = &'a Project>, today: NaiveDate) -> Self {
    let mut stats = Self::default();
    let mut employees = BTreeSet::new();
    let mut with_deadline = 0usize;

    for project in projects {
      stats.total += 1;
      stats.total_budget += project.budget();

      if let Some(deadline) = project.deadline_day() {
        with_deadline += 1;
        if deadline < today {
          stats.overdue += 1;
        }
      }

      let p = progress(project);
      if p > 100.0 {
        stats.over_budget += 1;
      } else if p >= 80.0 {
        stats.nearing_limit += 1;
      }

      employees.extend(project.employees_starred.iter().map(|e| e.searchname.as_str()));
    }

    stats.active_employees = employees.len();
    if stats.total > 0 {
      stats.average_value = stats.total_budget / stats.total as f64;
      stats.deadline_percentage = with_deadline as f64 / stats.total as f64 * 100.0;
    }
    stats
  }
}
