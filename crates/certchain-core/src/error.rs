//! Error types for `certchain-core`.
//!
//! The variants mirror the failure taxonomy of the issuance and verification
//! protocol. Collaborator errors (store, ledger) are boxed so the core stays
//! independent of any concrete backend.

use thiserror::Error;
use uuid::Uuid;

use crate::identity::Party;

/// A type-erased collaborator error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or malformed request fields. Nothing was written.
  #[error("validation failed: {0}")]
  Validation(String),

  /// The recipient or issuer IIN did not resolve. Nothing was written.
  #[error("{party} with IIN {iin} not found")]
  IdentityNotFound { party: Party, iin: String },

  /// The relational insert failed. Nothing was written.
  #[error("failed to persist certificate: {0}")]
  Persistence(#[source] BoxError),

  /// The ledger rejected or never accepted the transaction. The relational
  /// row has been removed again.
  #[error("ledger submission failed: {0}")]
  LedgerSubmission(#[source] BoxError),

  /// The transaction was submitted but did not reach confirmation. The
  /// relational row has been removed again.
  #[error("ledger confirmation failed: {0}")]
  LedgerConfirmation(#[source] BoxError),

  /// The ledger write failed and deleting the relational row failed as well.
  /// The store now holds a row with no ledger commitment; an operator has to
  /// reconcile it.
  #[error(
    "compensation failed for certificate {certificate_id} after {ledger_error}: {delete_error}"
  )]
  CompensationFailed {
    certificate_id: Uuid,
    ledger_error:   Box<Error>,
    #[source]
    delete_error:   BoxError,
  },

  /// Confirmation gave up before the transaction's fate was known and the
  /// ledger holds no commitment yet. The transaction may still be included,
  /// so the relational row is kept; an operator has to reconcile it.
  #[error("ledger outcome unknown for certificate {certificate_id} (tx {tx_ref}): {ledger_error}")]
  LedgerUnresolved {
    certificate_id: Uuid,
    tx_ref:         String,
    #[source]
    ledger_error:   BoxError,
  },

  #[error("certificate not found: {0}")]
  CertificateNotFound(Uuid),

  /// The ledger answered but holds no commitment for the certificate.
  #[error("ledger holds no commitment for certificate {0}")]
  LedgerRecordMissing(Uuid),

  /// The ledger could not be queried at all.
  #[error("ledger unavailable: {0}")]
  LedgerUnavailable(#[source] BoxError),

  /// A store read outside the issuance write path failed.
  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("authentication required")]
  Unauthenticated,

  #[error("forbidden: {0}")]
  Forbidden(String),

  /// The detached ledger task panicked or was cancelled by the runtime.
  #[error("ledger task interrupted: {0}")]
  Interrupted(String),
}

impl Error {
  /// Stable snake_case name of the variant, exposed in HTTP error bodies so
  /// clients can branch without parsing messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Validation(_) => "validation",
      Self::IdentityNotFound { .. } => "identity_not_found",
      Self::Persistence(_) => "persistence",
      Self::LedgerSubmission(_) => "ledger_submission",
      Self::LedgerConfirmation(_) => "ledger_confirmation",
      Self::CompensationFailed { .. } => "compensation_failed",
      Self::LedgerUnresolved { .. } => "ledger_unresolved",
      Self::CertificateNotFound(_) => "certificate_not_found",
      Self::LedgerRecordMissing(_) => "ledger_record_missing",
      Self::LedgerUnavailable(_) => "ledger_unavailable",
      Self::Store(_) => "store",
      Self::Unauthenticated => "unauthenticated",
      Self::Forbidden(_) => "forbidden",
      Self::Interrupted(_) => "interrupted",
    }
  }

  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
