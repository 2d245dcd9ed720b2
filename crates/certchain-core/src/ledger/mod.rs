//! The `Ledger` trait: the append-only commitment store on the smart-contract
//! side.
//!
//! Submission and confirmation are separate calls because a transaction is
//! accepted long before it is final. Backends decode whatever the contract
//! returns into [`LedgerCommitment`] once, at their boundary.

mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  certificate::{Certificate, IssuerType},
  commitment::{Commitments, Digest},
};

pub use memory::{MemoryLedger, MemoryLedgerError};

// ─── Wire types ──────────────────────────────────────────────────────────────

/// Arguments of the contract's `issueCertificate` call, in ABI order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub certificate_id:   Uuid,
  pub recipient_iin:    String,
  pub issuer_iin:       String,
  pub issuer_type:      IssuerType,
  pub issuer_hash:      Digest,
  pub certificate_hash: Digest,
  /// Seconds since the Unix epoch.
  pub issued_at:        u64,
}

impl LedgerEntry {
  /// Build the ledger arguments for a freshly persisted certificate.
  /// `issued_at` is the row's `date_of_issue` truncated to seconds.
  pub fn new(cert: &Certificate, commitments: &Commitments) -> Self {
    Self {
      certificate_id:   cert.id,
      recipient_iin:    cert.recipient.iin.clone(),
      issuer_iin:       cert.issuer.iin.clone(),
      issuer_type:      cert.issuer_kind.issuer_type(),
      issuer_hash:      commitments.issuer_hash,
      certificate_hash: commitments.certificate_hash,
      issued_at:        u64::try_from(cert.date_of_issue.timestamp()).unwrap_or(0),
    }
  }
}

/// A submitted but not yet confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
  pub certificate_id: Uuid,
  /// Backend transaction reference (a transaction hash for EVM ledgers).
  pub tx_ref:         String,
}

/// A transaction that reached the configured finality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
  pub tx_ref:       String,
  /// `None` when inclusion was established by reading the commitment back
  /// after confirmation timed out, rather than from the receipt.
  pub block_number: Option<u64>,
}

/// The commitment record stored on the ledger for one certificate.
///
/// Field order follows the tuple returned by the contract's
/// `getCertificate`: index 4 is the issuer hash, index 5 the certificate hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCommitment {
  /// The certificate id as the ledger stores it (a string on chain).
  pub certificate_id:   String,
  pub recipient_iin:    String,
  pub issuer_iin:       String,
  pub issuer_type:      IssuerType,
  pub issuer_hash:      Digest,
  pub certificate_hash: Digest,
  pub issued_at:        u64,
}

impl From<LedgerEntry> for LedgerCommitment {
  fn from(e: LedgerEntry) -> Self {
    Self {
      certificate_id:   e.certificate_id.to_string(),
      recipient_iin:    e.recipient_iin,
      issuer_iin:       e.issuer_iin,
      issuer_type:      e.issuer_type,
      issuer_hash:      e.issuer_hash,
      certificate_hash: e.certificate_hash,
      issued_at:        e.issued_at,
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the external ledger.
///
/// Implementations are injected into the coordinator and verifier; there is
/// no process-wide ledger client.
pub trait Ledger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Submit the commitment transaction. Resolves once the network has
  /// accepted the transaction for inclusion.
  fn submit(
    &self,
    entry: LedgerEntry,
  ) -> impl Future<Output = Result<PendingTx, Self::Error>> + Send + '_;

  /// Wait until `pending` is final. May take an unbounded, network-dependent
  /// amount of time unless the backend enforces its own timeout.
  fn await_confirmation(
    &self,
    pending: PendingTx,
  ) -> impl Future<Output = Result<TxReceipt, Self::Error>> + Send + '_;

  /// `true` if `error`, returned by
  /// [`await_confirmation`](Self::await_confirmation), leaves the
  /// transaction's fate open: it may still be included later.
  fn is_indeterminate(&self, error: &Self::Error) -> bool {
    let _ = error;
    false
  }

  /// Read the commitment for `certificate_id`.
  ///
  /// `Ok(None)` means the ledger answered and holds no record; `Err` means it
  /// could not be asked.
  fn get_commitment(
    &self,
    certificate_id: Uuid,
  ) -> impl Future<Output = Result<Option<LedgerCommitment>, Self::Error>> + Send + '_;
}
