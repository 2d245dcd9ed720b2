//! The verification service.
//!
//! Re-derives both commitments from the stored certificate and compares them
//! with what the ledger holds. A mismatch is a verdict, not an error: the
//! report always carries all four digests so an auditor can recompute them
//! independently.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  certificate::Certificate,
  commitment::{Commitments, Digest},
  ledger::{Ledger, LedgerCommitment},
  store::CertificateStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
  pub certificate:              Certificate,
  pub ledger_record:            LedgerCommitment,
  pub derived_certificate_hash: Digest,
  pub derived_issuer_hash:      Digest,
  pub ledger_certificate_hash:  Digest,
  pub ledger_issuer_hash:       Digest,
  pub certificate_hash_matches: bool,
  pub issuer_hash_matches:      bool,
  /// Both hashes match.
  pub valid:                    bool,
}

impl VerificationReport {
  /// Compare a stored certificate with its ledger record.
  pub fn compare(certificate: Certificate, ledger_record: LedgerCommitment) -> Self {
    let derived = Commitments::of_certificate(&certificate);
    let certificate_hash_matches = derived.certificate_hash == ledger_record.certificate_hash;
    let issuer_hash_matches = derived.issuer_hash == ledger_record.issuer_hash;

    Self {
      derived_certificate_hash: derived.certificate_hash,
      derived_issuer_hash: derived.issuer_hash,
      ledger_certificate_hash: ledger_record.certificate_hash,
      ledger_issuer_hash: ledger_record.issuer_hash,
      certificate_hash_matches,
      issuer_hash_matches,
      valid: certificate_hash_matches && issuer_hash_matches,
      certificate,
      ledger_record,
    }
  }
}

/// Reads both stores and produces a [`VerificationReport`].
pub struct Verifier<S, L> {
  store:  Arc<S>,
  ledger: Arc<L>,
}

impl<S, L> Clone for Verifier<S, L> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), ledger: Arc::clone(&self.ledger) }
  }
}

impl<S, L> Verifier<S, L>
where
  S: CertificateStore,
  L: Ledger,
{
  pub fn new(store: Arc<S>, ledger: Arc<L>) -> Self { Self { store, ledger } }

  /// Verify the certificate `id`.
  ///
  /// Distinguishes a certificate that never existed
  /// ([`Error::CertificateNotFound`]) from an unreachable ledger
  /// ([`Error::LedgerUnavailable`]) and from a ledger with no record
  /// ([`Error::LedgerRecordMissing`], which may point to an issuance that
  /// escaped compensation).
  pub async fn verify(&self, id: Uuid) -> Result<VerificationReport> {
    let certificate = self
      .store
      .get_certificate(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::CertificateNotFound(id))?;

    let ledger_record = self
      .ledger
      .get_commitment(id)
      .await
      .map_err(|e| Error::LedgerUnavailable(Box::new(e)))?
      .ok_or(Error::LedgerRecordMissing(id))?;

    let report = VerificationReport::compare(certificate, ledger_record);
    if !report.valid {
      tracing::warn!(
        certificate_id = %id,
        certificate_hash_matches = report.certificate_hash_matches,
        issuer_hash_matches = report.issuer_hash_matches,
        "certificate does not match its ledger commitment"
      );
    }
    Ok(report)
  }
}
