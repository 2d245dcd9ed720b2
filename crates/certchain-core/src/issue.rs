//! The dual-write coordinator.
//!
//! Makes "row exists in the store" and "commitment exists on the ledger"
//! look atomic to callers although the two systems share no transaction:
//!
//! 1. validate the request and resolve both identities;
//! 2. derive the commitments (pure);
//! 3. persist the certificate row;
//! 4. submit the ledger transaction;
//! 5. await its confirmation;
//! 6. on failure in 4 or 5, delete the row again (compensation).
//!
//! Steps 1 and 2 leave nothing behind when they fail. Steps 3 to 6 run on a
//! detached task, so a caller going away mid-way never leaves a row without
//! its ledger write, a submitted transaction unobserved or a compensation
//! half-done.
//!
//! A confirmation that times out is not compensated: the commitment is read
//! back instead, and if it is still absent the row is kept and the issuance
//! reported as unresolved.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  certificate::{Certificate, IssueRequest, NewCertificate},
  commitment::Commitments,
  identity::{Party, resolve},
  ledger::{Ledger, LedgerEntry, TxReceipt},
  store::CertificateStore,
};

/// Result of a committed issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issued {
  pub certificate: Certificate,
  pub commitments: Commitments,
  pub receipt:     TxReceipt,
}

/// Orchestrates issuance across the store and the ledger.
///
/// Cloning is cheap; both collaborators are reference-counted.
pub struct Coordinator<S, L> {
  store:  Arc<S>,
  ledger: Arc<L>,
}

impl<S, L> Clone for Coordinator<S, L> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), ledger: Arc::clone(&self.ledger) }
  }
}

impl<S, L> Coordinator<S, L>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  pub fn new(store: Arc<S>, ledger: Arc<L>) -> Self { Self { store, ledger } }

  /// Issue a certificate.
  ///
  /// Two identical requests produce two certificates with distinct ids and
  /// two ledger entries; there is no deduplication key.
  pub async fn issue(&self, request: IssueRequest) -> Result<Issued> {
    let valid = request.validate()?;

    let recipient =
      resolve(&*self.store, Party::Recipient, &valid.recipient_iin).await?;
    let issuer = resolve(&*self.store, Party::Issuer, &valid.issuer_iin).await?;

    let issuer_snapshot = issuer.snapshot();
    let commitments = Commitments::derive(
      &issuer_snapshot,
      &valid.issuer_kind,
      &valid.certificate_theme,
      &valid.certificate_body,
    );
    debug!(
      certificate_hash = %commitments.certificate_hash,
      issuer_hash = %commitments.issuer_hash,
      "derived commitments"
    );

    let new_certificate = NewCertificate {
      recipient:         recipient.snapshot(),
      issuer:            issuer_snapshot,
      issuer_kind:       valid.issuer_kind,
      certificate_theme: valid.certificate_theme,
      certificate_body:  valid.certificate_body,
    };
    let task = tokio::spawn(write_both(
      Arc::clone(&self.store),
      Arc::clone(&self.ledger),
      new_certificate,
      commitments,
    ));
    let (certificate, receipt) = task
      .await
      .map_err(|e| Error::Interrupted(e.to_string()))??;

    info!(
      certificate_id = %certificate.id,
      tx_ref = %receipt.tx_ref,
      block_number = ?receipt.block_number,
      "certificate committed"
    );
    Ok(Issued { certificate, commitments, receipt })
  }
}

/// Persist the row, then submit and confirm its commitment, compensating on
/// failure. Runs to completion even if the caller stops waiting.
async fn write_both<S, L>(
  store: Arc<S>,
  ledger: Arc<L>,
  new_certificate: NewCertificate,
  commitments: Commitments,
) -> Result<(Certificate, TxReceipt)>
where
  S: CertificateStore,
  L: Ledger,
{
  let certificate = store
    .create_certificate(new_certificate)
    .await
    .map_err(|e| Error::Persistence(Box::new(e)))?;
  debug!(certificate_id = %certificate.id, "persisted certificate row");

  let entry = LedgerEntry::new(&certificate, &commitments);
  let receipt = write_ledger(&*store, &*ledger, entry).await?;
  Ok((certificate, receipt))
}

/// Submit and confirm `entry`, compensating on failure.
async fn write_ledger<S, L>(store: &S, ledger: &L, entry: LedgerEntry) -> Result<TxReceipt>
where
  S: CertificateStore,
  L: Ledger,
{
  let certificate_id = entry.certificate_id;

  let pending = match ledger.submit(entry).await {
    Ok(pending) => pending,
    Err(e) => {
      let ledger_error = Error::LedgerSubmission(Box::new(e));
      return Err(compensate(store, certificate_id, ledger_error).await);
    }
  };
  debug!(%certificate_id, tx_ref = %pending.tx_ref, "ledger transaction submitted");

  let tx_ref = pending.tx_ref.clone();
  match ledger.await_confirmation(pending).await {
    Ok(receipt) => Ok(receipt),
    Err(e) if ledger.is_indeterminate(&e) => {
      reconcile(ledger, certificate_id, tx_ref, e).await
    }
    Err(e) => {
      let ledger_error = Error::LedgerConfirmation(Box::new(e));
      Err(compensate(store, certificate_id, ledger_error).await)
    }
  }
}

/// Settle a confirmation that gave up without a verdict by reading the
/// commitment back. The row is never deleted here: the transaction may still
/// be included.
async fn reconcile<L>(
  ledger: &L,
  certificate_id: Uuid,
  tx_ref: String,
  confirmation_error: L::Error,
) -> Result<TxReceipt>
where
  L: Ledger,
{
  warn!(
    %certificate_id,
    %tx_ref,
    error = %confirmation_error,
    "confirmation timed out; reading the commitment back"
  );

  match ledger.get_commitment(certificate_id).await {
    Ok(Some(_)) => {
      info!(%certificate_id, %tx_ref, "commitment found after confirmation timeout");
      return Ok(TxReceipt { tx_ref, block_number: None });
    }
    Ok(None) => {}
    Err(read_error) => {
      warn!(%certificate_id, error = %read_error, "could not read the commitment back");
    }
  }

  error!(
    %certificate_id,
    %tx_ref,
    "ledger outcome unknown; certificate row kept and needs manual reconciliation"
  );
  Err(Error::LedgerUnresolved {
    certificate_id,
    tx_ref,
    ledger_error: Box::new(confirmation_error),
  })
}

/// Delete the row written for `certificate_id` and return the error to report.
///
/// This is a best-effort reversal: if the delete fails too the row is
/// orphaned, which is reported as [`Error::CompensationFailed`].
async fn compensate<S>(store: &S, certificate_id: Uuid, ledger_error: Error) -> Error
where
  S: CertificateStore,
{
  warn!(
    %certificate_id,
    error = %ledger_error,
    "ledger write failed; removing certificate row"
  );

  match store.delete_certificate(certificate_id).await {
    Ok(true) => ledger_error,
    Ok(false) => {
      warn!(%certificate_id, "certificate row was already gone during compensation");
      ledger_error
    }
    Err(delete_error) => {
      error!(
        %certificate_id,
        ledger_error = %ledger_error,
        delete_error = %delete_error,
        "compensation failed; certificate row has no ledger commitment and needs manual reconciliation"
      );
      Error::CompensationFailed {
        certificate_id,
        ledger_error: Box::new(ledger_error),
        delete_error: Box::new(delete_error),
      }
    }
  }
}
