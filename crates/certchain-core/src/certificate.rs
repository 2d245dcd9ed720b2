//! Certificate records and the issuance request.
//!
//! A certificate row is written once by the coordinator and never updated.
//! The only deletion path is the coordinator's own compensation when the
//! paired ledger write fails.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  identity::{IdentitySnapshot, is_valid_iin},
};

// ─── Issuer type ─────────────────────────────────────────────────────────────

/// Whether a certificate was issued by a natural person or an organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuerType {
  Person,
  Organization,
}

impl IssuerType {
  /// The discriminant passed to the ledger contract. Wire contract: 0 is
  /// PERSON, 1 is ORGANIZATION.
  pub fn code(self) -> u8 {
    match self {
      Self::Person => 0,
      Self::Organization => 1,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(Self::Person),
      1 => Some(Self::Organization),
      _ => None,
    }
  }

  /// The string stored in the `issuer_type` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Person => "PERSON",
      Self::Organization => "ORGANIZATION",
    }
  }
}

impl fmt::Display for IssuerType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for IssuerType {
  type Err = Error;

  /// Case-insensitive; the British spelling `ORGANISATION` is accepted too.
  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "PERSON" => Ok(Self::Person),
      "ORGANIZATION" | "ORGANISATION" => Ok(Self::Organization),
      other => Err(Error::Validation(format!(
        "issuer_type must be PERSON or ORGANIZATION, got {other:?}"
      ))),
    }
  }
}

/// Issuer type together with the fields that only exist for organisations.
///
/// The organisation fields live inside the variant, so a certificate can never
/// carry only one of them or carry them for a PERSON issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issuer_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuerKind {
  Person,
  Organization {
    organisation_name: String,
    bin:               String,
  },
}

impl IssuerKind {
  pub fn issuer_type(&self) -> IssuerType {
    match self {
      Self::Person => IssuerType::Person,
      Self::Organization { .. } => IssuerType::Organization,
    }
  }
}

// ─── Certificate ─────────────────────────────────────────────────────────────

/// A persisted certificate together with the identity snapshots captured when
/// it was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
  pub id:                Uuid,
  pub recipient:         IdentitySnapshot,
  pub issuer:            IdentitySnapshot,
  #[serde(flatten)]
  pub issuer_kind:       IssuerKind,
  pub certificate_theme: String,
  pub certificate_body:  String,
  /// Server-assigned; never accepted from clients.
  pub date_of_issue:     DateTime<Utc>,
}

/// Input to [`crate::store::CertificateStore::create_certificate`].
/// `id` and `date_of_issue` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewCertificate {
  pub recipient:         IdentitySnapshot,
  pub issuer:            IdentitySnapshot,
  pub issuer_kind:       IssuerKind,
  pub certificate_theme: String,
  pub certificate_body:  String,
}

// ─── Issue request ───────────────────────────────────────────────────────────

/// Unvalidated issuance input as received from a client.
///
/// Missing string fields deserialise as empty so that validation, not the
/// JSON extractor, reports them. There is no `date_of_issue`
/// field: unknown fields are ignored and the timestamp is server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueRequest {
  #[serde(default)]
  pub recipient_iin:     String,
  #[serde(default)]
  pub issuer_type:       String,
  #[serde(default)]
  pub issuer_iin:        String,
  pub organisation_name: Option<String>,
  pub bin:               Option<String>,
  #[serde(default)]
  pub certificate_theme: String,
  #[serde(default)]
  pub certificate_body:  String,
}

/// An [`IssueRequest`] that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIssue {
  pub recipient_iin:     String,
  pub issuer_iin:        String,
  pub issuer_kind:       IssuerKind,
  pub certificate_theme: String,
  pub certificate_body:  String,
}

impl IssueRequest {
  /// Check required fields and the issuer-type invariant.
  ///
  /// Theme and body are kept byte-for-byte: they are hash inputs. Organisation
  /// fields sent with a PERSON issuer are dropped.
  pub fn validate(self) -> Result<ValidatedIssue> {
    require_iin("recipient_iin", &self.recipient_iin)?;
    require_iin("issuer_iin", &self.issuer_iin)?;
    require("certificate_theme", &self.certificate_theme)?;
    require("certificate_body", &self.certificate_body)?;

    let issuer_kind = match self.issuer_type.parse::<IssuerType>()? {
      IssuerType::Person => IssuerKind::Person,
      IssuerType::Organization => {
        let organisation_name = self.organisation_name.unwrap_or_default();
        let bin = self.bin.unwrap_or_default();
        require("organisation_name", &organisation_name)?;
        require("bin", &bin)?;
        IssuerKind::Organization { organisation_name, bin }
      }
    };

    Ok(ValidatedIssue {
      recipient_iin: self.recipient_iin,
      issuer_iin: self.issuer_iin,
      issuer_kind,
      certificate_theme: self.certificate_theme,
      certificate_body: self.certificate_body,
    })
  }
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} is required")));
  }
  Ok(())
}

fn require_iin(field: &str, value: &str) -> Result<()> {
  require(field, value)?;
  if !is_valid_iin(value) {
    return Err(Error::Validation(format!(
      "{field} must be exactly 12 digits"
    )));
  }
  Ok(())
}
