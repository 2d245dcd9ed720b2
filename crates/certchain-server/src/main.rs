//! certchain server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `CERTCHAIN_*` environment variables, opens the SQLite store, connects the
//! configured ledger and serves the JSON API over HTTP.
//!
//! # Bootstrapping an admin
//!
//! Register through the API, then:
//!
//! ```
//! cargo run -p certchain-server -- --grant-admin jane@example.kz
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use certchain_core::{
  ledger::{Ledger, MemoryLedger},
  store::CertificateStore,
};
use certchain_ledger_rpc::RpcLedger;
use certchain_server::{AppState, LedgerConfig, ServerConfig};
use certchain_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "certchain certificate registry server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Give an existing user the admin flag and exit.
  #[arg(long, value_name = "EMAIL")]
  grant_admin: Option<String>,
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
      config::Environment::with_prefix("CERTCHAIN")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: promote a user and exit.
  if let Some(email) = cli.grant_admin {
    let identity = store
      .find_identity_by_email(&email)
      .await?
      .with_context(|| format!("no user with email {email}"))?;
    store.set_admin(identity.user_id, true).await?;
    tracing::info!(user_id = %identity.user_id, %email, "granted admin");
    return Ok(());
  }

  let store = Arc::new(store);
  match server_cfg.ledger.clone() {
    LedgerConfig::Memory => {
      tracing::warn!("using the in-memory ledger; commitments are lost on restart");
      serve(store, Arc::new(MemoryLedger::new()), server_cfg).await
    }
    LedgerConfig::Rpc(rpc_cfg) => {
      tracing::info!(
        rpc_url = %rpc_cfg.rpc_url,
        contract = %rpc_cfg.contract_address,
        "using JSON-RPC ledger"
      );
      let ledger = RpcLedger::new(rpc_cfg).context("failed to build RPC client")?;
      serve(store, Arc::new(ledger), server_cfg).await
    }
  }
}

async fn serve<L>(
  store:      Arc<SqliteStore>,
  ledger:     Arc<L>,
  server_cfg: ServerConfig,
) -> anyhow::Result<()>
where
  L: Ledger + 'static,
{
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let app = certchain_server::router(AppState::new(store, ledger, server_cfg));

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
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
