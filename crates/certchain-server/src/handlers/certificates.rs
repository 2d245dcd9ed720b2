//! Handlers for `/api/certificates` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/certificates` | Issue; caller must own `issuer_iin` or be admin |
//! | `GET`  | `/api/certificates` | Certificates the caller issued or received |
//! | `GET`  | `/api/certificates/{id}` | Issuer, recipient or admin only |
//! | `GET`  | `/api/certificates/{id}/verification` | Public |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use certchain_core::{
  Error as CoreError,
  access::{authorize_issue, authorize_read},
  certificate::{Certificate, IssueRequest},
  ledger::Ledger,
  store::{CertificateFilter, CertificateStore},
  verify::VerificationReport,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::Authenticated,
  error::{Error, Result},
};

// ─── Issue ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct IssueResponse {
  pub id:              Uuid,
  pub tx_ref:          String,
  pub block_number:    Option<u64>,
  pub certificate_url: String,
}

/// `POST /api/certificates`
pub async fn issue<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
  Json(request): Json<IssueRequest>,
) -> Result<impl IntoResponse>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  authorize_issue(&caller, &request.issuer_iin)?;

  let issued = state.coordinator.issue(request).await?;
  let id = issued.certificate.id;

  Ok((
    StatusCode::CREATED,
    Json(IssueResponse {
      id,
      tx_ref: issued.receipt.tx_ref,
      block_number: issued.receipt.block_number,
      certificate_url: state.certificate_url(id),
    }),
  ))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /api/certificates`
pub async fn list_mine<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<Certificate>>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  let filter = CertificateFilter { party_iin: Some(caller.iin) };
  let certificates = state
    .store
    .list_certificates(&filter)
    .await
    .map_err(Error::store)?;
  Ok(Json(certificates))
}

/// `GET /api/certificates/{id}`
pub async fn get_one<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Certificate>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  let certificate = state
    .store
    .get_certificate(id)
    .await
    .map_err(Error::store)?
    .ok_or(CoreError::CertificateNotFound(id))?;
  authorize_read(&caller, &certificate)?;
  Ok(Json(certificate))
}

// ─── Verify ──────────────────────────────────────────────────────────────────

/// `GET /api/certificates/{id}/verification`
pub async fn verify<S, L>(
  State(state): State<AppState<S, L>>,
  Path(id): Path<Uuid>,
) -> Result<Json<VerificationReport>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  Ok(Json(state.verifier.verify(id).await?))
}
