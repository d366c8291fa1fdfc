mod cache;
mod config;
mod dashboard;
mod db;
mod error;
mod gripp;
mod report;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::{CacheLayer, CacheStorage, PassiveRefresh, RefreshEvent, SqliteStorage, SyncOutcome};
use dashboard::{DashboardStats, DeadlinePeriod, FilterOptions, ProjectFilter, ProgressRange, SortOrder};
use gripp::client::GrippClient;
use report::DetailView;

type Layer = CacheLayer<SqliteStorage, GrippClient>;

#[derive(Parser, Debug)]
#[command(name = "gripp-dash")]
#[command(about = "A cached command-line dashboard for Gripp projects")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/gripp-dash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List active projects
  List {
    #[command(flatten)]
    filter: FilterArgs,
    #[arg(long, value_enum, default_value_t)]
    sort: SortOrder,
  },
  /// Headline figures of the (filtered) project list
  Stats {
    #[command(flatten)]
    filter: FilterArgs,
  },
  /// Full detail of one project, fetched from Gripp
  Show {
    id: i64,
    /// Budget breakdown to show
    #[arg(long, value_enum, default_value_t)]
    view: DetailView,
  },
  /// Clear the cache and fetch everything again
  Refresh,
  /// Sync with Gripp now and report whether anything changed
  Sync,
  /// Empty the local cache
  ClearCache {
    /// Keep cached projects, only drop generic cache entries
    #[arg(long)]
    entries_only: bool,
  },
  /// Check the connection to Gripp
  Probe,
  /// Reprint the project list on every passive refresh until Ctrl-C
  Watch {
    #[arg(long, value_enum, default_value_t)]
    sort: SortOrder,
  },
  /// Distinct clients, employees and phases available to the filters
  Options,
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
  /// Client (company) name
  #[arg(long)]
  client: Option<String>,
  /// Starred employee name
  #[arg(long)]
  employee: Option<String>,
  /// Project phase name
  #[arg(long)]
  phase: Option<String>,
  #[arg(long, value_enum, default_value_t)]
  deadline: DeadlinePeriod,
  #[arg(long, value_enum, default_value_t)]
  progress: ProgressRange,
}

impl From<FilterArgs> for ProjectFilter {
  fn from(args: FilterArgs) -> Self {
    Self {
      client: args.client.filter(|s| !s.is_empty()),
      starred_employee: args.employee.filter(|s| !s.is_empty()),
      phase: args.phase.filter(|s| !s.is_empty()),
      deadline: args.deadline,
      progress: args.progress,
    }
  }
}

/// Log to a daily rolling file in the data directory; stdout carries the
/// command output.
fn init_logging() -> WorkerGuard {
  let dir = dirs::data_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join("gripp-dash")
    .join("logs");
  let appender = tracing_appender::rolling::daily(dir, "gripp-dash.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_env("GRIPP_DASH_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false),
    )
    .init();

  guard
}

fn today() -> NaiveDate {
  Local::now().date_naive()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_logging();

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let policy = config.policy()?;

  let storage = match &config.cache_path {
    Some(path) => SqliteStorage::open(path)?,
    None => SqliteStorage::open_default()?,
  };
  storage.init()?;
  let client = GrippClient::new(&config)?;
  let layer: Layer = CacheLayer::new(Arc::new(storage), Arc::new(client), policy);

  info!(command = ?args.command, "Starting");
  run(&layer, args.command).await
}

async fn run(layer: &Layer, command: Command) -> Result<()> {
  match command {
    Command::List { filter, sort } => {
      let result = layer.fetch_active_projects().await?;
      let filter = ProjectFilter::from(filter);
      let selected = filter.apply(&result.data, sort, today());
      report::print_source(&result);
      report::print_projects(&selected);
    }
    Command::Stats { filter } => {
      let projects = layer.get_active_projects().await?;
      let filter = ProjectFilter::from(filter);
      let today = today();
      let selected = filter.apply(&projects, SortOrder::default(), today);
      report::print_stats(&DashboardStats::compute(selected.iter().copied(), today));
    }
    Command::Show { id, view } => {
      let project = layer.get_project_detail(id).await?;
      if dashboard::is_internal(&project) {
        return Err(eyre!("Project {} is an internal Gripp project", id));
      }
      report::print_detail(&project, view);
    }
    Command::Refresh => {
      let result = layer.force_refresh().await?;
      println!("Refreshed {} projects from {}", result.data.len(), result.source.label());
    }
    Command::Sync => match layer.background_sync().await? {
      SyncOutcome::Updated(count) => println!("Cache updated with {} projects", count),
      SyncOutcome::Unchanged => println!("Cache already up to date"),
    },
    Command::ClearCache { entries_only } => {
      if entries_only {
        layer.clear_cache_entries().await?;
        println!("Cache entries cleared");
      } else {
        layer.clear_cache().await?;
        println!("Cache cleared");
      }
    }
    Command::Probe => {
      if let Some(previous) = layer.last_probe()? {
        println!("Previous successful probe: {}", report::local_time(previous.timestamp));
      }
      let body = layer.probe().await?;
      println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Command::Watch { sort } => watch(layer, sort).await?,
    Command::Options => {
      let projects = layer.get_active_projects().await?;
      report::print_options(&FilterOptions::collect(&projects));
    }
  }

  Ok(())
}

async fn watch(layer: &Layer, sort: SortOrder) -> Result<()> {
  let mut refresh = PassiveRefresh::start(layer.clone());
  let filter = ProjectFilter::default();

  loop {
    tokio::select! {
      event = refresh.next() => match event {
        Some(RefreshEvent::Loaded(result)) => {
          let selected = filter.apply(&result.data, sort, today());
          report::print_source(&result);
          report::print_projects(&selected);
          println!();
        }
        Some(RefreshEvent::Failed(message)) => eprintln!("Refresh failed: {}", message),
        None => break,
      },
      _ = tokio::signal::ctrl_c() => break,
    }
  }

  refresh.stop();
  Ok(())
}
