//! mangaguesser server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `MANGAGUESSER_*` environment variables, opens the SQLite store, starts the
//! maintenance sweeper, and serves the game API over HTTP.
//!
//! # Loading the catalog
//!
//! ```
//! cargo run -p mangaguesser-api --bin server -- --import-catalog ./mangas
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use mangaguesser_api::{
  AppState, ServerConfig,
  identity::JwtCodec,
  image::HttpImageSource,
};
use mangaguesser_core::{
  Engine,
  identity::{IdentityResolver, TokenCodec},
  store::GameStore,
  sweeper::Sweeper,
};
use mangaguesser_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Manga guesser game server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Import `<dir>/<title>/<image>` into the catalog and exit.
  #[arg(long, value_name = "DIR")]
  import_catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("MANGAGUESSER")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("allowed_origins")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  anyhow::ensure!(server_cfg.sweep_interval_secs > 0, "sweep_interval_secs must be positive");

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Helper mode: import a catalog directory and exit.
  if let Some(dir) = cli.import_catalog {
    let summary = store
      .import_catalog_dir(&dir)
      .await
      .with_context(|| format!("failed to import catalog from {dir:?}"))?;
    println!("imported {} titles, {} new images", summary.titles, summary.assets);
    return Ok(());
  }

  let titles = store
    .titles_with_assets()
    .await
    .context("failed to read catalog")?
    .len();
  if titles < server_cfg.policy.candidates_per_round {
    tracing::warn!(
      titles,
      needed = server_cfg.policy.candidates_per_round,
      "catalog too small to deal rounds; run with --import-catalog"
    );
  }

  // Build application state.
  let tokens: Arc<dyn TokenCodec> = Arc::new(JwtCodec::new(
    server_cfg.token_secret.as_bytes(),
    server_cfg.token_ttl(),
  ));
  let images = HttpImageSource::new(server_cfg.image_fetch_timeout())
    .context("failed to build image client")?;

  let engine = Engine::new(
    store.clone(),
    server_cfg.policy.clone(),
    server_cfg.image_base_url.clone(),
  )
  .context("failed to build engine")?;

  let state = AppState {
    engine:   Arc::new(engine),
    resolver: Arc::new(IdentityResolver::standard(tokens.clone(), store.clone())),
    tokens,
    images:   Arc::new(images),
    config:   Arc::new(server_cfg.clone()),
  };

  // Background maintenance.
  let (stop_tx, mut stop_rx) = watch::channel(false);
  let sweeper = Sweeper::new(
    store,
    server_cfg.policy.clone(),
    server_cfg.sweep_interval(),
    server_cfg.sweep_pass_timeout(),
  )
  .spawn(async move {
    let _ = stop_rx.changed().await;
  });

  let app = mangaguesser_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  let _ = stop_tx.send(true);
  if let Err(e) = sweeper.await {
    tracing::warn!(error = %e, "sweeper task ended abnormally");
  }

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
