//! Protocol tests for the coordinator and verifier, run against an in-memory
//! store and [`MemoryLedger`].

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error,
  certificate::{Certificate, IssueRequest, IssuerKind, NewCertificate},
  commitment::{Commitments, certificate_hash},
  identity::{Identity, NewIdentity, Party},
  issue::Coordinator,
  ledger::{Ledger, MemoryLedger},
  store::{CertificateFilter, CertificateStore, Statistics},
  verify::{VerificationReport, Verifier},
};

// ─── Fake store ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("fake store failure")]
struct FakeError;

#[derive(Default)]
struct FakeStore {
  identities:   Mutex<HashMap<String, Identity>>,
  certificates: Mutex<HashMap<Uuid, Certificate>>,
  fail_create:  AtomicBool,
  fail_delete:  AtomicBool,
  /// Reply to `create_certificate` only after a delay, with the row already
  /// inserted.
  slow_create:  AtomicBool,
}

impl FakeStore {
  fn with_identity(self, iin: &str, name: &str, surname: &str) -> Self {
    let identity = Identity {
      user_id:    Uuid::new_v4(),
      email:      format!("{iin}@example.com"),
      name:       name.into(),
      surname:    surname.into(),
      iin:        iin.into(),
      is_admin:   false,
      created_at: Utc::now(),
    };
    self.identities.lock().unwrap().insert(iin.into(), identity);
    self
  }

  fn certificate_count(&self) -> usize { self.certificates.lock().unwrap().len() }

  fn edit(&self, id: Uuid, f: impl FnOnce(&mut Certificate)) {
    f(self.certificates.lock().unwrap().get_mut(&id).unwrap());
  }
}

impl CertificateStore for FakeStore {
  type Error = FakeError;

  async fn register(&self, _input: NewIdentity) -> Result<Identity, FakeError> {
    unimplemented!()
  }

  async fn find_identity_by_iin<'a>(
    &'a self,
    iin: &'a str,
  ) -> Result<Option<Identity>, FakeError> {
    Ok(self.identities.lock().unwrap().get(iin).cloned())
  }

  async fn find_identity_by_email<'a>(
    &'a self,
    _email: &'a str,
  ) -> Result<Option<Identity>, FakeError> {
    unimplemented!()
  }

  async fn credentials<'a>(
    &'a self,
    _email: &'a str,
  ) -> Result<Option<(Identity, String)>, FakeError> {
    unimplemented!()
  }

  async fn list_identities(&self) -> Result<Vec<Identity>, FakeError> {
    unimplemented!()
  }

  async fn set_admin(
    &self,
    _user_id: Uuid,
    _is_admin: bool,
  ) -> Result<Option<Identity>, FakeError> {
    unimplemented!()
  }

  async fn create_certificate(
    &self,
    input: NewCertificate,
  ) -> Result<Certificate, FakeError> {
    if self.fail_create.load(Ordering::SeqCst) {
      return Err(FakeError);
    }
    let cert = Certificate {
      id:                Uuid::new_v4(),
      recipient:         input.recipient,
      issuer:            input.issuer,
      issuer_kind:       input.issuer_kind,
      certificate_theme: input.certificate_theme,
      certificate_body:  input.certificate_body,
      date_of_issue:     Utc::now(),
    };
    self.certificates.lock().unwrap().insert(cert.id, cert.clone());
    if self.slow_create.load(Ordering::SeqCst) {
      tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Ok(cert)
  }

  async fn get_certificate(&self, id: Uuid) -> Result<Option<Certificate>, FakeError> {
    Ok(self.certificates.lock().unwrap().get(&id).cloned())
  }

  async fn delete_certificate(&self, id: Uuid) -> Result<bool, FakeError> {
    if self.fail_delete.load(Ordering::SeqCst) {
      return Err(FakeError);
    }
    Ok(self.certificates.lock().unwrap().remove(&id).is_some())
  }

  async fn list_certificates<'a>(
    &'a self,
    _filter: &'a CertificateFilter,
  ) -> Result<Vec<Certificate>, FakeError> {
    unimplemented!()
  }

  async fn statistics(&self, _since: DateTime<Utc>) -> Result<Statistics, FakeError> {
    unimplemented!()
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

const ISSUER: &str = "111111111111";
const RECIPIENT: &str = "222222222222";

struct Harness {
  store:       Arc<FakeStore>,
  ledger:      Arc<MemoryLedger>,
  coordinator: Coordinator<FakeStore, MemoryLedger>,
  verifier:    Verifier<FakeStore, MemoryLedger>,
}

fn harness() -> Harness {
  let store = Arc::new(
    FakeStore::default()
      .with_identity(ISSUER, "Aigerim", "Nurlanova")
      .with_identity(RECIPIENT, "Daniyar", "Sadykov"),
  );
  let ledger = Arc::new(MemoryLedger::new());
  Harness {
    coordinator: Coordinator::new(Arc::clone(&store), Arc::clone(&ledger)),
    verifier: Verifier::new(Arc::clone(&store), Arc::clone(&ledger)),
    store,
    ledger,
  }
}

fn person_request() -> IssueRequest {
  IssueRequest {
    recipient_iin: RECIPIENT.into(),
    issuer_type: "PERSON".into(),
    issuer_iin: ISSUER.into(),
    certificate_theme: "Diploma".into(),
    certificate_body: "Body1".into(),
    ..Default::default()
  }
}

// ─── Issuance ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn issue_then_verify_is_valid() {
  let h = harness();
  let issued = h.coordinator.issue(person_request()).await.unwrap();

  assert_eq!(h.store.certificate_count(), 1);
  assert_eq!(h.ledger.len(), 1);
  assert_eq!(issued.receipt.block_number, Some(1));
  assert_eq!(issued.certificate.issuer.name, "Aigerim");
  assert_eq!(issued.certificate.recipient.surname, "Sadykov");
  assert_eq!(issued.commitments.certificate_hash, certificate_hash("Diploma", "Body1"));

  let report = h.verifier.verify(issued.certificate.id).await.unwrap();
  assert!(report.valid);
  assert!(report.certificate_hash_matches);
  assert!(report.issuer_hash_matches);
  assert_eq!(report.derived_certificate_hash, report.ledger_certificate_hash);
  assert_eq!(report.derived_issuer_hash, report.ledger_issuer_hash);
  assert_eq!(report.ledger_record.certificate_id, issued.certificate.id.to_string());
}

#[tokio::test]
async fn organisation_issuer_commits_organisation_fields() {
  let h = harness();
  let request = IssueRequest {
    issuer_type: "ORGANIZATION".into(),
    organisation_name: Some("Acme".into()),
    bin: Some("AB123456789012".into()),
    ..person_request()
  };
  let issued = h.coordinator.issue(request).await.unwrap();

  let expected = Commitments::of_certificate(&issued.certificate);
  assert_eq!(issued.commitments, expected);

  let record = h
    .ledger
    .get_commitment(issued.certificate.id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(record.issuer_type.code(), 1);
  assert_eq!(record.issuer_hash, expected.issuer_hash);
  assert!(h.verifier.verify(issued.certificate.id).await.unwrap().valid);
}

#[tokio::test]
async fn unknown_issuer_writes_nothing() {
  let h = harness();
  let request = IssueRequest { issuer_iin: "999999999999".into(), ..person_request() };

  let err = h.coordinator.issue(request).await.unwrap_err();
  assert!(matches!(
    err,
    Error::IdentityNotFound { party: Party::Issuer, ref iin } if iin == "999999999999"
  ));
  assert_eq!(h.store.certificate_count(), 0);
  assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn unknown_recipient_writes_nothing() {
  let h = harness();
  let request = IssueRequest { recipient_iin: "999999999999".into(), ..person_request() };

  let err = h.coordinator.issue(request).await.unwrap_err();
  assert!(matches!(err, Error::IdentityNotFound { party: Party::Recipient, .. }));
  assert_eq!(h.store.certificate_count(), 0);
  assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn invalid_request_writes_nothing() {
  let h = harness();
  let request = IssueRequest { certificate_theme: "  ".into(), ..person_request() };

  let err = h.coordinator.issue(request).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert_eq!(h.store.certificate_count(), 0);
  assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn persistence_failure_skips_the_ledger() {
  let h = harness();
  h.store.fail_create.store(true, Ordering::SeqCst);

  let err = h.coordinator.issue(person_request()).await.unwrap_err();
  assert!(matches!(err, Error::Persistence(_)));
  assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn submission_failure_removes_the_row() {
  let h = harness();
  h.ledger.fail_next_submit("nonce too low");

  let err = h.coordinator.issue(person_request()).await.unwrap_err();
  assert!(matches!(err, Error::LedgerSubmission(_)));
  assert_eq!(h.store.certificate_count(), 0);
  assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn confirmation_failure_removes_the_row() {
  let h = harness();
  h.ledger.fail_next_confirmation("dropped from mempool");

  let err = h.coordinator.issue(person_request()).await.unwrap_err();
  assert!(matches!(err, Error::LedgerConfirmation(_)));
  assert_eq!(h.store.certificate_count(), 0);
  assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn failed_compensation_is_reported_distinctly() {
  let h = harness();
  h.ledger.fail_next_submit("rejected");
  h.store.fail_delete.store(true, Ordering::SeqCst);

  let err = h.coordinator.issue(person_request()).await.unwrap_err();
  let (certificate_id, ledger_error) = match err {
    Error::CompensationFailed { certificate_id, ledger_error, .. } => {
      (certificate_id, ledger_error)
    }
    other => panic!("expected CompensationFailed, got {other:?}"),
  };
  assert!(matches!(*ledger_error, Error::LedgerSubmission(_)));

  // The orphaned row is still there and has no ledger record.
  assert_eq!(h.store.certificate_count(), 1);
  assert!(matches!(
    h.verifier.verify(certificate_id).await,
    Err(Error::LedgerRecordMissing(id)) if id == certificate_id
  ));
}

#[tokio::test]
async fn abandoned_issue_still_reaches_the_ledger() {
  let h = harness();
  h.store.slow_create.store(true, Ordering::SeqCst);

  let outcome =
    tokio::time::timeout(Duration::from_millis(50), h.coordinator.issue(person_request()))
      .await;
  assert!(outcome.is_err(), "caller should have given up");

  tokio::time::sleep(Duration::from_millis(500)).await;
  assert_eq!(h.store.certificate_count(), 1);
  assert_eq!(h.ledger.len(), 1);
}

#[tokio::test]
async fn abandoned_issue_is_still_compensated() {
  let h = harness();
  h.store.slow_create.store(true, Ordering::SeqCst);
  h.ledger.fail_next_submit("rejected");

  let outcome =
    tokio::time::timeout(Duration::from_millis(50), h.coordinator.issue(person_request()))
      .await;
  assert!(outcome.is_err());

  tokio::time::sleep(Duration::from_millis(500)).await;
  assert_eq!(h.store.certificate_count(), 0);
  assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn timed_out_confirmation_that_landed_is_committed() {
  let h = harness();
  h.ledger.time_out_next_confirmation(true);

  let issued = h.coordinator.issue(person_request()).await.unwrap();
  assert_eq!(issued.receipt.block_number, None);
  assert_eq!(h.store.certificate_count(), 1);

  let report = h.verifier.verify(issued.certificate.id).await.unwrap();
  assert!(report.valid);
}

#[tokio::test]
async fn timed_out_confirmation_without_commitment_keeps_the_row() {
  let h = harness();
  h.ledger.time_out_next_confirmation(false);

  let err = h.coordinator.issue(person_request()).await.unwrap_err();
  let certificate_id = match err {
    Error::LedgerUnresolved { certificate_id, tx_ref, .. } => {
      assert!(tx_ref.starts_with("0x"));
      certificate_id
    }
    other => panic!("expected LedgerUnresolved, got {other:?}"),
  };

  // The row stays: the pending transaction may still be mined.
  assert_eq!(h.store.certificate_count(), 1);
  assert!(matches!(
    h.verifier.verify(certificate_id).await,
    Err(Error::LedgerRecordMissing(id)) if id == certificate_id
  ));
}

#[tokio::test]
async fn identical_requests_produce_two_certificates() {
  let h = harness();
  let first = h.coordinator.issue(person_request()).await.unwrap();
  let second = h.coordinator.issue(person_request()).await.unwrap();

  assert_ne!(first.certificate.id, second.certificate.id);
  assert_eq!(first.commitments, second.commitments);
  assert_eq!(h.store.certificate_count(), 2);
  assert_eq!(h.ledger.len(), 2);
}

// ─── Verification ────────────────────────────────────────────────────────────

#[tokio::test]
async fn edited_body_fails_only_the_certificate_hash() {
  let h = harness();
  let issued = h.coordinator.issue(person_request()).await.unwrap();
  h.store.edit(issued.certificate.id, |c| c.certificate_body = "Body2".into());

  let report = h.verifier.verify(issued.certificate.id).await.unwrap();
  assert!(!report.valid);
  assert!(!report.certificate_hash_matches);
  assert!(report.issuer_hash_matches);
  assert_eq!(report.ledger_certificate_hash, issued.commitments.certificate_hash);
}

#[tokio::test]
async fn edited_issuer_snapshot_fails_only_the_issuer_hash() {
  let h = harness();
  let issued = h.coordinator.issue(person_request()).await.unwrap();
  h.store.edit(issued.certificate.id, |c| c.issuer.surname = "Nurlanov".into());

  let report = h.verifier.verify(issued.certificate.id).await.unwrap();
  assert!(!report.valid);
  assert!(report.certificate_hash_matches);
  assert!(!report.issuer_hash_matches);
}

#[tokio::test]
async fn shifting_bytes_between_theme_and_body_goes_undetected() {
  let h = harness();
  let issued = h.coordinator.issue(person_request()).await.unwrap();
  h.store.edit(issued.certificate.id, |c| {
    c.certificate_theme = "Diplo".into();
    c.certificate_body = "maBody1".into();
  });

  assert!(h.verifier.verify(issued.certificate.id).await.unwrap().valid);
}

#[tokio::test]
async fn tampered_ledger_record_is_detected() {
  let h = harness();
  let issued = h.coordinator.issue(person_request()).await.unwrap();
  assert!(h.ledger.tamper(issued.certificate.id, |r| {
    r.certificate_hash = certificate_hash("Forged", "Body");
  }));

  let report = h.verifier.verify(issued.certificate.id).await.unwrap();
  assert!(!report.valid);
  assert!(!report.certificate_hash_matches);
}

#[tokio::test]
async fn verifying_an_unknown_certificate() {
  let h = harness();
  let id = Uuid::new_v4();
  assert!(matches!(
    h.verifier.verify(id).await,
    Err(Error::CertificateNotFound(got)) if got == id
  ));
}

#[tokio::test]
async fn unreachable_ledger_is_not_a_mismatch() {
  let h = harness();
  let issued = h.coordinator.issue(person_request()).await.unwrap();
  h.ledger.set_unreachable(true);

  assert!(matches!(
    h.verifier.verify(issued.certificate.id).await,
    Err(Error::LedgerUnavailable(_))
  ));
}

#[test]
fn report_carries_all_four_digests() {
  let cert = Certificate {
    id:                Uuid::new_v4(),
    recipient:         crate::identity::IdentitySnapshot {
      iin:     RECIPIENT.into(),
      name:    "R".into(),
      surname: "R".into(),
    },
    issuer:            crate::identity::IdentitySnapshot {
      iin:     ISSUER.into(),
      name:    "I".into(),
      surname: "I".into(),
    },
    issuer_kind:       IssuerKind::Person,
    certificate_theme: "T".into(),
    certificate_body:  "B".into(),
    date_of_issue:     Utc::now(),
  };
  let commitments = Commitments::of_certificate(&cert);
  let mut record = crate::ledger::LedgerCommitment::from(
    crate::ledger::LedgerEntry::new(&cert, &commitments),
  );
  record.issuer_hash = certificate_hash("x", "y");

  let report = VerificationReport::compare(cert, record);
  assert_eq!(report.derived_issuer_hash, commitments.issuer_hash);
  assert_eq!(report.ledger_issuer_hash, certificate_hash("x", "y"));
  assert!(report.certificate_hash_matches);
  assert!(!report.issuer_hash_matches);
  assert!(!report.valid);
}
