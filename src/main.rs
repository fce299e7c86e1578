use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vitrina::catalog::{CachedCatalog, CatalogClient};
use vitrina::config::Config;
use vitrina::{logging, Query, QueryCache, QuerySnapshot};

#[derive(Parser, Debug)]
#[command(name = "vitrina")]
#[command(about = "Read the storefront catalog through the query cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/vitrina/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log to stderr at debug level instead of the log file
  #[arg(short, long)]
  verbose: bool,

  /// Re-read every N seconds, printing whenever the data changes
  #[arg(short, long, value_name = "SECS", global = true)]
  watch: Option<u64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List products, newest first
  Products {
    /// Category slug to filter by
    #[arg(short, long)]
    category: Option<String>,
  },
  /// Show one product
  Product { id: i64 },
  /// List categories
  Categories,
  /// List featured products
  Featured {
    #[arg(short, long, default_value_t = 8)]
    limit: u32,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.verbose)?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let cache = QueryCache::new();
  let sweeper = cache.start_sweeper(config.cache.sweep_interval());
  let catalog = CachedCatalog::new(
    CatalogClient::new(&config)?,
    cache,
    config.cache.query_options(),
  );

  let watch = args.watch.map(Duration::from_secs);
  let result = match args.command {
    Command::Products { category } => show(catalog.products(category.as_deref()), watch).await,
    Command::Product { id } => show(catalog.product(id), watch).await,
    Command::Categories => show(catalog.categories(), watch).await,
    Command::Featured { limit } => show(catalog.featured(limit), watch).await,
  };

  sweeper.shutdown().await;
  result
}

/// Fetch once, then optionally keep re-reading through the cache.
async fn show<T>(query: Query<T>, watch: Option<Duration>) -> Result<()>
where
  T: Serialize + Send + Sync + 'static,
{
  query.fetch();
  let snapshot = query.settled().await;
  print_snapshot(&snapshot)?;

  if snapshot.data.is_none() {
    return Err(eyre!(
      "{}",
      snapshot.error.unwrap_or_else(|| "No data returned".to_string())
    ));
  }

  let Some(every) = watch else {
    return Ok(());
  };

  watch_loop(&query, every, snapshot.data, tokio::signal::ctrl_c()).await
}

/// Re-read on every tick until `stop` resolves.
///
/// `stop` is polled across iterations, so a stop that lands while a tick is
/// still waiting on the query ends the loop right after that tick.
async fn watch_loop<T, S>(
  query: &Query<T>,
  every: Duration,
  mut last: Option<Arc<T>>,
  stop: S,
) -> Result<()>
where
  T: Serialize + Send + Sync + 'static,
  S: Future,
{
  let mut ticker = tokio::time::interval(every);
  ticker.tick().await;
  tokio::pin!(stop);

  loop {
    tokio::select! {
      biased;
      _ = &mut stop => break,
      _ = ticker.tick() => {
        query.fetch();
        if query.is_stale() {
          info!(key = query.key(), "serving stale data while revalidating");
        }

        let snapshot = query.settled().await;
        let changed = match (&last, &snapshot.data) {
          (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
          (None, None) => false,
          _ => true,
        };
        if changed || snapshot.error.is_some() {
          print_snapshot(&snapshot)?;
        }
        last = snapshot.data;
      }
    }
  }

  Ok(())
}

fn print_snapshot<T: Serialize>(snapshot: &QuerySnapshot<T>) -> Result<()> {
  if let Some(error) = snapshot.error() {
    eprintln!("error: {}", error);
  }
  if let Some(data) = snapshot.data() {
    let json = serde_json::to_string_pretty(data)
      .map_err(|e| eyre!("Failed to serialize result: {}", e))?;
    println!("{}", json);
  }
  Ok(())
}
