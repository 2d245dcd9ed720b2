//! HTTP surface for certchain.
//!
//! Exposes an axum [`Router`] over any [`CertificateStore`] and [`Ledger`]
//! pair. Issuance and verification are delegated to
//! [`Coordinator`] and [`Verifier`]; this crate adds authentication, the
//! access gates and the JSON mapping.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, patch, post},
};
use certchain_core::{
  issue::Coordinator, ledger::Ledger, store::CertificateStore, verify::Verifier,
};
use certchain_ledger_rpc::RpcLedgerConfig;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use handlers::{admin, certificates, users};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3000 }

/// Which ledger backend to run against.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LedgerConfig {
  /// In-process ledger. Commitments are lost on restart.
  #[default]
  Memory,
  Rpc(RpcLedgerConfig),
}

/// Runtime server configuration, deserialised from `config.toml` and the
/// environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  /// Public origin used to build `certificate_url`, without trailing slash.
  pub base_url:   String,
  pub store_path: PathBuf,
  #[serde(default)]
  pub ledger:     LedgerConfig,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, L> {
  pub store:       Arc<S>,
  pub coordinator: Coordinator<S, L>,
  pub verifier:    Verifier<S, L>,
  pub config:      Arc<ServerConfig>,
}

impl<S, L> Clone for AppState<S, L> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      coordinator: self.coordinator.clone(),
      verifier:    self.verifier.clone(),
      config:      Arc::clone(&self.config),
    }
  }
}

impl<S, L> AppState<S, L>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  pub fn new(store: Arc<S>, ledger: Arc<L>, config: ServerConfig) -> Self {
    Self {
      coordinator: Coordinator::new(Arc::clone(&store), Arc::clone(&ledger)),
      verifier:    Verifier::new(Arc::clone(&store), ledger),
      config:      Arc::new(config),
      store,
    }
  }

  /// Public link to a certificate.
  pub fn certificate_url(&self, id: Uuid) -> String {
    format!("{}/certificates/{id}", self.config.base_url.trim_end_matches('/'))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the certchain API.
pub fn router<S, L>(state: AppState<S, L>) -> Router
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  Router::new()
    // Users
    .route("/api/auth/register",                  post(users::register::<S, L>))
    .route("/api/users/me",                       get(users::me::<S, L>))
    // Certificates
    .route(
      "/api/certificates",
      get(certificates::list_mine::<S, L>).post(certificates::issue::<S, L>),
    )
    .route("/api/certificates/{id}",              get(certificates::get_one::<S, L>))
    .route("/api/certificates/{id}/verification", get(certificates::verify::<S, L>))
    // Admin
    .route("/api/admin/certificates",             get(admin::certificates::<S, L>))
    .route("/api/admin/users",                    get(admin::users::<S, L>))
    .route("/api/admin/users/{id}",               patch(admin::set_admin::<S, L>))
    .route("/api/admin/statistics",               get(admin::statistics::<S, L>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
