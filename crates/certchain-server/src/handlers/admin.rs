//! Handlers for `/api/admin` endpoints. All require an admin caller.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/api/admin/certificates` | All certificates, newest first |
//! | `GET`   | `/api/admin/users` | All users, newest first |
//! | `PATCH` | `/api/admin/users/{id}` | Body: `{"is_admin": bool}` |
//! | `GET`   | `/api/admin/statistics` | Optional `?months=<n>` (default 6) |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use certchain_core::{
  access::{authorize_admin, authorize_admin_change},
  certificate::Certificate,
  identity::Identity,
  ledger::Ledger,
  store::{CertificateFilter, CertificateStore, Statistics},
};
use chrono::{DateTime, Months, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::Authenticated,
  error::{Error, Result},
};

/// `GET /api/admin/certificates`
pub async fn certificates<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<Certificate>>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  authorize_admin(&caller)?;
  let all = state
    .store
    .list_certificates(&CertificateFilter::default())
    .await
    .map_err(Error::store)?;
  Ok(Json(all))
}

/// `GET /api/admin/users`
pub async fn users<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<Identity>>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  authorize_admin(&caller)?;
  let all = state.store.list_identities().await.map_err(Error::store)?;
  Ok(Json(all))
}

#[derive(Debug, Deserialize)]
pub struct SetAdminBody {
  pub is_admin: bool,
}

/// `PATCH /api/admin/users/{id}`
pub async fn set_admin<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<SetAdminBody>,
) -> Result<Json<Identity>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  authorize_admin_change(&caller, id, body.is_admin)?;

  let identity = state
    .store
    .set_admin(id, body.is_admin)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("user {id}")))?;

  tracing::info!(
    user_id = %id,
    is_admin = body.is_admin,
    changed_by = %caller.user_id,
    "admin flag changed"
  );
  Ok(Json(identity))
}

#[derive(Debug, Deserialize)]
pub struct StatisticsParams {
  pub months: Option<u32>,
}

/// `GET /api/admin/statistics[?months=<n>]`
pub async fn statistics<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
  Query(params): Query<StatisticsParams>,
) -> Result<Json<Statistics>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  authorize_admin(&caller)?;

  let months = params.months.unwrap_or(6);
  let since = Utc::now()
    .checked_sub_months(Months::new(months))
    .unwrap_or(DateTime::<Utc>::MIN_UTC);

  let stats = state.store.statistics(since).await.map_err(Error::store)?;
  Ok(Json(stats))
}
