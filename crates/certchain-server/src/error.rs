//! Error types and axum `IntoResponse` implementation.
//!
//! Every error renders as `{"error": "...", "kind": "..."}` so clients can
//! branch on `kind` without parsing messages.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use certchain_core::{BoxError, Error as CoreError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::Core(e) => match e {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::IdentityNotFound { .. }
        | CoreError::CertificateNotFound(_)
        | CoreError::LedgerRecordMissing(_) => StatusCode::NOT_FOUND,
        CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::LedgerSubmission(_) | CoreError::LedgerConfirmation(_) => {
          StatusCode::BAD_GATEWAY
        }
        CoreError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::LedgerUnresolved { .. } => StatusCode::GATEWAY_TIMEOUT,
        CoreError::Persistence(_)
        | CoreError::CompensationFailed { .. }
        | CoreError::Store(_)
        | CoreError::Interrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Conflict(_) => StatusCode::CONFLICT,
      Self::Store(_) | Self::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      Self::Core(e) => e.kind(),
      Self::NotFound(_) => "not_found",
      Self::BadRequest(_) => "bad_request",
      Self::Conflict(_) => "conflict",
      Self::Store(_) => "store",
      Self::PasswordHash(_) => "internal",
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, kind = self.kind(), "request failed");
    }

    let mut res =
      (status, Json(json!({ "error": self.to_string(), "kind": self.kind() })))
        .into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"certchain\""),
      );
    }
    res
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn ledger_failures_map_to_gateway_statuses() {
    let submission = Error::from(CoreError::LedgerSubmission("rejected".into()));
    assert_eq!(submission.status(), StatusCode::BAD_GATEWAY);

    let unavailable = Error::from(CoreError::LedgerUnavailable("down".into()));
    assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

    let unresolved = Error::from(CoreError::LedgerUnresolved {
      certificate_id: Uuid::nil(),
      tx_ref:         "0xabc".into(),
      ledger_error:   "no receipt after 120s".into(),
    });
    assert_eq!(unresolved.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(unresolved.kind(), "ledger_unresolved");
  }

  #[test]
  fn compensation_failure_has_its_own_kind() {
    let err = Error::from(CoreError::CompensationFailed {
      certificate_id: Uuid::nil(),
      ledger_error:   Box::new(CoreError::LedgerConfirmation("timeout".into())),
      delete_error:   "disk I/O error".into(),
    });
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.kind(), "compensation_failed");
  }

  #[test]
  fn unauthenticated_challenges_for_basic_auth() {
    let res = Error::from(CoreError::Unauthenticated).into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
