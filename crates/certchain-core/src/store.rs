//! The `CertificateStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `certchain-store-sqlite`).
//! The coordinator, verifier and HTTP layer depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  certificate::{Certificate, IssuerType, NewCertificate},
  identity::{Identity, NewIdentity},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`CertificateStore::list_certificates`].
#[derive(Debug, Clone, Default)]
pub struct CertificateFilter {
  /// Restrict to certificates where this IIN is the issuer or the recipient.
  pub party_iin: Option<String>,
}

/// Certificates issued in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
  /// `YYYY-MM`.
  pub month: String,
  pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerCount {
  pub iin:     String,
  pub name:    String,
  pub surname: String,
  pub count:   u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerTypeCount {
  pub issuer_type: IssuerType,
  pub count:       u64,
}

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
  pub total_users:              u64,
  pub total_certificates:       u64,
  /// Oldest month first.
  pub certificates_by_month:    Vec<MonthlyCount>,
  /// At most five, most prolific first.
  pub top_issuers:              Vec<IssuerCount>,
  pub issuer_type_distribution: Vec<IssuerTypeCount>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store holding identities and certificates.
///
/// Certificate rows are append-only apart from
/// [`delete_certificate`](Self::delete_certificate), which exists solely for
/// the coordinator's compensation path.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CertificateStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identities ────────────────────────────────────────────────────────

  /// Persist a new identity. Fails if the IIN or email is already taken.
  fn register(
    &self,
    input: NewIdentity,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;

  /// Whether `error` is [`register`](Self::register) refusing a taken IIN or
  /// email.
  fn is_duplicate(&self, error: &Self::Error) -> bool {
    let _ = error;
    false
  }

  fn find_identity_by_iin<'a>(
    &'a self,
    iin: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  fn find_identity_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  /// Look up an identity together with its stored password hash, for
  /// credential checks only.
  fn credentials<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<(Identity, String)>, Self::Error>> + Send + 'a;

  /// All identities, newest first.
  fn list_identities(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  /// Set the admin flag. Returns `None` if the identity does not exist.
  fn set_admin(
    &self,
    user_id: Uuid,
    is_admin: bool,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  // ── Certificates ──────────────────────────────────────────────────────

  /// Insert a certificate row. The store assigns `id` and `date_of_issue`.
  fn create_certificate(
    &self,
    input: NewCertificate,
  ) -> impl Future<Output = Result<Certificate, Self::Error>> + Send + '_;

  /// Retrieve a certificate with its identity snapshots. Returns `None` if
  /// not found.
  fn get_certificate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Certificate>, Self::Error>> + Send + '_;

  /// Delete a certificate row. Returns `false` if there was nothing to delete.
  fn delete_certificate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Certificates matching `filter`, newest first.
  fn list_certificates<'a>(
    &'a self,
    filter: &'a CertificateFilter,
  ) -> impl Future<Output = Result<Vec<Certificate>, Self::Error>> + Send + 'a;

  /// Aggregate figures; `since` bounds the per-month series.
  fn statistics(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Statistics, Self::Error>> + Send + '_;
}
