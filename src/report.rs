//! Plain-text rendering of dashboard data on stdout.

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;

use crate::cache::{CacheResult, CacheSource};
use crate::dashboard::{
  budgeted_hours, line_label, line_progress, line_sections, product_groups, progress,
  written_hours, DashboardStats, FilterOptions,
};
use crate::gripp::types::{GrippDate, Project};

const NAME_WIDTH: usize = 40;
const CLIENT_WIDTH: usize = 24;

pub fn local_time(at: DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Cut `s` to `width` characters, marking the cut with an ellipsis.
fn truncate(s: &str, width: usize) -> String {
  if s.chars().count() <= width {
    s.to_string()
  } else {
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
  }
}

fn format_money(amount: f64) -> String {
  format!("€ {:.0}", amount)
}

pub fn print_source<T>(result: &CacheResult<T>) {
  let age = result
    .cached_at
    .map(|at| format!(" as of {}", local_time(at)))
    .unwrap_or_default();
  println!("Source: {}{}", result.source.label(), age);
  if result.source == CacheSource::Offline {
    eprintln!("Gripp is unreachable; showing cached projects");
  }
}

pub fn print_projects(projects: &[&Project]) {
  if projects.is_empty() {
    println!("No projects found");
    return;
  }

  println!(
    "{:>7}  {:<name$}  {:<client$}  {:<10}  {:>12}  {:>8}",
    "ID",
    "NAME",
    "CLIENT",
    "DEADLINE",
    "BUDGET",
    "PROGRESS",
    name = NAME_WIDTH,
    client = CLIENT_WIDTH,
  );
  for project in projects {
    let client = project
      .company
      .as_ref()
      .map(|c| c.searchname.as_str())
      .unwrap_or("-");
    let deadline = project
      .deadline_day()
      .map(|d| d.to_string())
      .unwrap_or_else(|| "-".to_string());
    println!(
      "{:>7}  {:<name$}  {:<client$}  {:<10}  {:>12}  {:>7.1}%",
      project.id,
      truncate(&project.name, NAME_WIDTH),
      truncate(client, CLIENT_WIDTH),
      deadline,
      format_money(project.budget()),
      progress(project),
      name = NAME_WIDTH,
      client = CLIENT_WIDTH,
    );
  }
  println!("{} projects", projects.len());
}

pub fn print_stats(stats: &DashboardStats) {
  println!("Active projects:     {}", stats.total);
  println!("Overdue:             {}", stats.overdue);
  println!("Total budget:        {}", format_money(stats.total_budget));
  println!("Average value:       {}", format_money(stats.average_value));
  println!("Over budget:         {}", stats.over_budget);
  println!("Nearing budget:      {}", stats.nearing_limit);
  println!("Starred employees:   {}", stats.active_employees);
  println!("With deadline:       {:.1}%", stats.deadline_percentage);
}

/// Which budget breakdown `print_detail` shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DetailView {
  /// Hours per product
  #[default]
  Products,
  /// Every line, under its group label
  Lines,
}

fn print_field(label: &str, value: impl std::fmt::Display) {
  println!("{:<12}{}", format!("{}:", label), value);
}

fn print_date(label: &str, date: Option<&GrippDate>) {
  if let Some(day) = date.and_then(GrippDate::day) {
    print_field(label, day);
  }
}

/// Text content of Gripp's HTML descriptions.
fn plain_text(html: &str) -> String {
  let mut text = String::with_capacity(html.len());
  let mut tag = String::new();
  let mut in_tag = false;

  for c in html.chars() {
    match c {
      '<' => {
        in_tag = true;
        tag.clear();
      }
      '>' if in_tag => {
        in_tag = false;
        let name = tag.trim_start_matches('/').to_ascii_lowercase();
        if name.starts_with("br") || (tag.starts_with('/') && (name == "p" || name == "li")) {
          text.push('\n');
        }
      }
      _ if in_tag => tag.push(c),
      _ => text.push(c),
    }
  }

  text
    .replace("&nbsp;", " ")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
    .replace("&amp;", "&")
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

fn hours(written: f64, budgeted: f64) -> String {
  format!("{:.1} / {:.1} h", written, budgeted)
}

pub fn print_detail(project: &Project, view: DetailView) {
  if project.name.is_empty() {
    println!("Project #{}", project.number.unwrap_or(project.id));
  } else {
    println!("{}", project.name);
  }
  let context: Vec<&str> = [
    project.company.as_ref().map(|c| c.searchname.as_str()),
    project.phase.as_ref().map(|p| p.searchname.as_str()),
  ]
  .into_iter()
  .flatten()
  .filter(|s| !s.is_empty())
  .collect();
  if !context.is_empty() {
    println!("{}", context.join(" • "));
  }
  println!();

  print_field("Progress", format!("{:.1}%", progress(project)));
  print_field("Hours", hours(written_hours(project), budgeted_hours(project)));
  print_field("Budget", format!("{} excl. VAT", format_money(project.budget())));
  println!();

  if let Some(template) = &project.templateset {
    print_field("Template", &template.searchname);
  }
  if let Some(manager) = project.employees_starred.first() {
    print_field("Manager", &manager.searchname);
  }
  if let Some(number) = project.number {
    print_field("Number", format!("#{}", number));
  }
  print_date("Start", project.startdate.as_ref());
  print_date("Deadline", project.deadline.as_ref());
  print_date("Delivery", project.deliverydate.as_ref());
  if !project.tags.is_empty() {
    let tags: Vec<&str> = project.tags.iter().map(|t| t.name.as_str()).collect();
    print_field("Tags", tags.join(", "));
  }
  if let Some(url) = &project.viewonlineurl {
    print_field("Online", url);
  }

  if let Some(description) = project.description.as_deref().map(plain_text) {
    if !description.is_empty() {
      println!();
      println!("{}", description);
    }
  }

  if project.projectlines.is_empty() {
    return;
  }

  println!();
  match view {
    DetailView::Products => print_products(project),
    DetailView::Lines => print_sections(project),
  }
}

fn print_products(project: &Project) {
  let total_written = written_hours(project);

  println!(
    "{:<name$}  {:>5}  {:>18}  {:>8}  {:>8}",
    "PRODUCT",
    "LINES",
    "HOURS",
    "PROGRESS",
    "SHARE",
    name = NAME_WIDTH,
  );
  for group in product_groups(project) {
    let share = if total_written > 0.0 {
      group.written / total_written * 100.0
    } else {
      0.0
    };
    println!(
      "{:<name$}  {:>5}  {:>18}  {:>7.1}%  {:>7.1}%",
      truncate(&group.name, NAME_WIDTH),
      group.lines.len(),
      hours(group.written, group.budgeted),
      group.progress(),
      share,
      name = NAME_WIDTH,
    );
  }
}

fn print_sections(project: &Project) {
  for (index, section) in line_sections(project).iter().enumerate() {
    if index > 0 {
      println!();
    }
    println!("{}", section.title);
    for line in &section.lines {
      println!(
        "  {:<name$}  {:>18}  {:>7.1}%",
        truncate(line_label(line), NAME_WIDTH),
        hours(line.written(), line.amount),
        line_progress(line),
        name = NAME_WIDTH,
      );
    }
  }
}

pub fn print_options(options: &FilterOptions) {
  let sections = [
    ("Clients", &options.clients),
    ("Starred employees", &options.starred_employees),
    ("Phases", &options.phases),
  ];
  for (title, values) in sections {
    println!("{}:", title);
    for value in values {
      println!("  {}", value);
    }
  }
}
