use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use larosa::cache::{CacheSource, CacheStore, NoopStore, SqliteStore};
use larosa::config::Config;
use larosa::service::{
  DataService, DataServices, DatasetSession, DatasetView, GroupedSession, MessageKind,
  RefreshPolicy, StatusMessage, PRESETS,
};
use larosa::sheets::{DocumentKind, GroupedDataset, Record, SheetsClient};

#[derive(Parser, Debug)]
#[command(name = "larosa")]
#[command(about = "Cache-first access to the Larosa point-of-sale spreadsheet")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/larosa/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Mirror logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print a dataset: the cached view first, then the refreshed one
  Show {
    /// vendor, customer, product, invoice, settlement or quotation
    dataset: String,
    /// Skip the refresh while the cached copy is still fresh
    #[arg(long)]
    fresh_ok: bool,
    #[arg(long)]
    json: bool,
  },
  /// Refresh every dataset
  Refresh,
  /// Append a row given as COLUMN=VALUE pairs
  Add {
    dataset: String,
    #[arg(required = true, value_parser = parse_cell)]
    cells: Vec<(String, String)>,
  },
  /// Delete one row by its row index
  Delete { dataset: String, row_index: u64 },
  /// Delete every row of one document by its order number
  DeleteGroup { dataset: String, order_no: String },
  /// Clear the cache of one dataset, or of all of them
  Clear { dataset: Option<String> },
  /// Check credentials (password is read from LAROSA_PASSWORD)
  Login { username: String },
  /// Count one more transaction for the customer with this phone number
  IncrementTransaction { phone_number: String },
  /// Reserve (or preview) the next document number
  NextId {
    kind: Kind,
    /// Document date, YYYY-MM-DD (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Preview without consuming the number
    #[arg(long)]
    peek: bool,
  },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
  Inv,
  Qt,
}

impl From<Kind> for DocumentKind {
  fn from(kind: Kind) -> Self {
    match kind {
      Kind::Inv => DocumentKind::Invoice,
      Kind::Qt => DocumentKind::Quotation,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = match larosa::logging::init(args.verbose) {
    Ok(guard) => Some(guard),
    Err(e) => {
      eprintln!("Logging disabled: {}", e);
      None
    }
  };

  let config = Config::load(args.config.as_deref())?;

  if !config.cache.enabled {
    info!("Cache disabled, every load goes to the network");
    return run(args.command, &config, Arc::new(NoopStore)).await;
  }

  let store = SqliteStore::at_path(config.cache.resolved_path()?);
  run(args.command, &config, Arc::new(store)).await
}

async fn run<S: CacheStore>(command: Command, config: &Config, store: Arc<S>) -> Result<()> {
  match command {
    Command::Show {
      dataset,
      fresh_ok,
      json,
    } => {
      let services = connect(config, &store)?;
      let service = lookup(&services, &dataset)?;
      let policy = if fresh_ok {
        RefreshPolicy::WhenStale
      } else {
        RefreshPolicy::Always
      };
      let mut view = TerminalView { json };

      if let Some(grouping) = services.grouping(&dataset) {
        service
          .load_grouped_data_with(&mut view, |rows| grouping.group(rows), policy)
          .await;
      } else {
        service.load_data_with(&mut view, policy).await;
      }
    }

    Command::Refresh => {
      let services = connect(config, &store)?;
      let loads = services.iter().map(|(name, grouping, service)| async move {
        let mut view = QuietView;
        let count = match grouping {
          Some(grouping) => {
            service
              .load_grouped_data(&mut view, |rows| grouping.group(rows))
              .await
              .len()
          }
          None => service.load_data(&mut view).await.len(),
        };
        (name, count)
      });

      for (name, count) in join_all(loads).await {
        println!("{:<12} {}", name, count);
      }
    }

    Command::Add { dataset, cells } => {
      let services = connect(config, &store)?;
      if services.is_grouped(&dataset) {
        return Err(eyre!("{} holds grouped documents, add is for flat datasets", dataset));
      }
      let record = cells
        .into_iter()
        .fold(Record::new(), |record, (column, value)| record.with(column, value));
      let mut session = DatasetSession::new(lookup(&services, &dataset)?.clone());
      session.reload(&mut QuietView).await;
      session
        .add(record, services.unique_field(&dataset), &mut QuietView)
        .await?;
      println!(
        "Added to {} ({} rows)",
        session.service().table_name(),
        session.rows().len()
      );
    }

    Command::Delete { dataset, row_index } => {
      let services = connect(config, &store)?;
      if services.is_grouped(&dataset) {
        return Err(eyre!("{} holds grouped documents, use delete-group", dataset));
      }
      let mut session = DatasetSession::new(lookup(&services, &dataset)?.clone());
      session.reload(&mut QuietView).await;
      session.delete(row_index, &mut QuietView).await?;
      println!("Deleted row {} from {}", row_index, session.service().table_name());
    }

    Command::DeleteGroup { dataset, order_no } => {
      let services = connect(config, &store)?;
      let service = lookup(&services, &dataset)?.clone();
      let grouping = services
        .grouping(&dataset)
        .ok_or_else(|| eyre!("{} has no grouped documents, use delete", dataset))?;
      let mut session = GroupedSession::new(service, grouping.clone());
      session.reload(&mut QuietView).await;
      session.delete_group(&order_no, &mut QuietView).await?;
      println!("Deleted {} ({} left)", order_no, session.groups().len());
    }

    Command::Login { username } => {
      let password = Config::get_password()?;
      let client = SheetsClient::new(config)?;
      let outcome = client.login(&username, &password).await?;
      if !outcome.success {
        return Err(eyre!("Login failed: {}", outcome.message));
      }
      println!("Logged in as {}", outcome.user.as_deref().unwrap_or(&username));
    }

    Command::IncrementTransaction { phone_number } => {
      let client = SheetsClient::new(config)?;
      let count = client.increment_customer_transaction(&phone_number).await?;
      println!("{} now has {} transactions", phone_number, count);
    }

    // Local only, so it works without an endpoint configured
    Command::Clear { dataset } => clear(store.as_ref(), dataset.as_deref()).await?,

    Command::NextId { kind, date, peek } => {
      let client = SheetsClient::new(config)?;
      let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
      let id = if peek {
        client.peek_document_id(kind.into(), date).await?
      } else {
        client.next_document_id(kind.into(), date).await?
      };
      println!("{}", id.id);
    }
  }

  Ok(())
}

fn connect<S: CacheStore>(
  config: &Config,
  store: &Arc<S>,
) -> Result<DataServices<S, SheetsClient>> {
  let client = Arc::new(SheetsClient::new(config)?);
  Ok(DataServices::new(config, store.clone(), client))
}

fn parse_cell(pair: &str) -> std::result::Result<(String, String), String> {
  let (column, value) = pair
    .split_once('=')
    .ok_or_else(|| format!("expected COLUMN=VALUE, got '{}'", pair))?;
  if column.trim().is_empty() {
    return Err(format!("empty column name in '{}'", pair));
  }
  Ok((column.trim().to_string(), value.to_string()))
}

async fn clear<S: CacheStore>(store: &S, dataset: Option<&str>) -> Result<()> {
  let cleared = match dataset {
    Some(name) => {
      let preset = PRESETS
        .iter()
        .find(|preset| preset.name == name)
        .ok_or_else(|| eyre!("Unknown dataset '{}'", name))?;
      store.clear(preset.cache_key).await
    }
    None => store.clear_all().await,
  };

  if !cleared {
    return Err(eyre!("Failed to clear cache"));
  }
  info!("Cache cleared ({})", dataset.unwrap_or("all datasets"));
  Ok(())
}

fn lookup<'a, S: CacheStore, R: larosa::sheets::TabularStore>(
  services: &'a DataServices<S, R>,
  name: &str,
) -> Result<&'a Arc<DataService<S, R>>> {
  services.get(name).ok_or_else(|| {
    eyre!(
      "Unknown dataset '{}'. Known: {}",
      name,
      services.names().collect::<Vec<_>>().join(", ")
    )
  })
}

/// Prints every render to stdout as it happens.
struct TerminalView {
  json: bool,
}

impl TerminalView {
  fn heading(source: CacheSource) -> &'static str {
    match source {
      CacheSource::Network => "-- server --",
      CacheSource::CacheFresh => "-- cached --",
      CacheSource::CacheStale => "-- cached (stale, refreshing) --",
      CacheSource::Optimistic => "-- pending --",
      CacheSource::RolledBack => "-- rolled back --",
    }
  }

  fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
      Ok(text) => println!("{}", text),
      Err(e) => warn!("Failed to encode output: {}", e),
    }
  }
}

fn format_row(row: &Record) -> String {
  let cells = row
    .columns()
    .filter(|(_, value)| !value.is_blank())
    .map(|(column, value)| format!("{}={}", column.replace('\n', " "), value))
    .collect::<Vec<_>>()
    .join(" | ");

  match row.row_index() {
    Some(index) => format!("{:>5}  {}", index, cells),
    None => format!("{:>5}  {}", "-", cells),
  }
}

impl DatasetView<Vec<Record>> for TerminalView {
  fn render(&mut self, data: &Vec<Record>, source: CacheSource) {
    println!("{}", Self::heading(source));
    if self.json {
      return Self::print_json(data);
    }
    for row in data {
      println!("{}", format_row(row));
    }
  }

  fn show_message(&mut self, message: &StatusMessage) {
    print_message(message);
  }
}

impl DatasetView<GroupedDataset> for TerminalView {
  fn render(&mut self, data: &GroupedDataset, source: CacheSource) {
    println!("{}", Self::heading(source));
    if self.json {
      return Self::print_json(data);
    }
    for (order_no, rows) in data.iter() {
      println!("{} ({} rows)", order_no, rows.len());
      for row in rows {
        println!("  {}", format_row(row));
      }
    }
  }

  fn show_message(&mut self, message: &StatusMessage) {
    print_message(message);
  }
}

fn print_message(message: &StatusMessage) {
  match message.kind {
    MessageKind::Loading => eprintln!("{}", message.text),
    MessageKind::Empty | MessageKind::Error => println!("{}", message.text),
  }
}

/// Discards renders; used where only the loaded value matters.
struct QuietView;

impl<T> DatasetView<T> for QuietView {
  fn render(&mut self, _data: &T, _source: CacheSource) {}
}
