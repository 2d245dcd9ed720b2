//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 UTC strings with a fixed microsecond precision so
//! that lexical order in SQL equals chronological order. UUIDs are stored as
//! hyphenated lowercase strings.

use certchain_core::{
  certificate::{Certificate, IssuerKind, IssuerType},
  identity::{Identity, IdentitySnapshot},
};
use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── IssuerKind ──────────────────────────────────────────────────────────────

/// `(issuer_type, organisation_name, bin)` columns.
pub fn encode_issuer_kind(
  kind: &IssuerKind,
) -> (&'static str, Option<String>, Option<String>) {
  match kind {
    IssuerKind::Person => (IssuerType::Person.as_str(), None, None),
    IssuerKind::Organization { organisation_name, bin } => (
      IssuerType::Organization.as_str(),
      Some(organisation_name.clone()),
      Some(bin.clone()),
    ),
  }
}

pub fn decode_issuer_type(s: &str) -> Result<IssuerType> {
  match s {
    "PERSON" => Ok(IssuerType::Person),
    "ORGANIZATION" => Ok(IssuerType::Organization),
    other => Err(Error::Decode(format!("unknown issuer type: {other:?}"))),
  }
}

pub fn decode_issuer_kind(
  issuer_type: &str,
  organisation_name: Option<String>,
  bin: Option<String>,
) -> Result<IssuerKind> {
  match decode_issuer_type(issuer_type)? {
    IssuerType::Person => Ok(IssuerKind::Person),
    IssuerType::Organization => match (organisation_name, bin) {
      (Some(organisation_name), Some(bin)) => {
        Ok(IssuerKind::Organization { organisation_name, bin })
      }
      _ => Err(Error::Decode(
        "organisation issuer without organisation_name or bin".into(),
      )),
    },
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const IDENTITY_COLUMNS: &str =
  "user_id, email, name, surname, iin, is_admin, created_at";

/// Raw values read directly from an `identities` row.
pub struct RawIdentity {
  pub user_id:    String,
  pub email:      String,
  pub name:       String,
  pub surname:    String,
  pub iin:        String,
  pub is_admin:   bool,
  pub created_at: String,
}

impl RawIdentity {
  /// Read [`IDENTITY_COLUMNS`] starting at column 0.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      email:      row.get(1)?,
      name:       row.get(2)?,
      surname:    row.get(3)?,
      iin:        row.get(4)?,
      is_admin:   row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      user_id:    decode_uuid(&self.user_id)?,
      email:      self.email,
      name:       self.name,
      surname:    self.surname,
      iin:        self.iin,
      is_admin:   self.is_admin,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const CERTIFICATE_COLUMNS: &str = "certificate_id,
  recipient_iin, recipient_name, recipient_surname,
  issuer_iin, issuer_name, issuer_surname,
  issuer_type, organisation_name, bin,
  certificate_theme, certificate_body, date_of_issue";

/// Raw values read directly from a `certificates` row.
pub struct RawCertificate {
  pub certificate_id:    String,
  pub recipient_iin:     String,
  pub recipient_name:    String,
  pub recipient_surname: String,
  pub issuer_iin:        String,
  pub issuer_name:       String,
  pub issuer_surname:    String,
  pub issuer_type:       String,
  pub organisation_name: Option<String>,
  pub bin:               Option<String>,
  pub certificate_theme: String,
  pub certificate_body:  String,
  pub date_of_issue:     String,
}

impl RawCertificate {
  /// Read [`CERTIFICATE_COLUMNS`] starting at column 0.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      certificate_id:    row.get(0)?,
      recipient_iin:     row.get(1)?,
      recipient_name:    row.get(2)?,
      recipient_surname: row.get(3)?,
      issuer_iin:        row.get(4)?,
      issuer_name:       row.get(5)?,
      issuer_surname:    row.get(6)?,
      issuer_type:       row.get(7)?,
      organisation_name: row.get(8)?,
      bin:               row.get(9)?,
      certificate_theme: row.get(10)?,
      certificate_body:  row.get(11)?,
      date_of_issue:     row.get(12)?,
    })
  }

  pub fn into_certificate(self) -> Result<Certificate> {
    Ok(Certificate {
      id:                decode_uuid(&self.certificate_id)?,
      recipient:         IdentitySnapshot {
        iin:     self.recipient_iin,
        name:    self.recipient_name,
        surname: self.recipient_surname,
      },
      issuer:            IdentitySnapshot {
        iin:     self.issuer_iin,
        name:    self.issuer_name,
        surname: self.issuer_surname,
      },
      issuer_kind:       decode_issuer_kind(
        &self.issuer_type,
        self.organisation_name,
        self.bin,
      )?,
      certificate_theme: self.certificate_theme,
      certificate_body:  self.certificate_body,
      date_of_issue:     decode_dt(&self.date_of_issue)?,
    })
  }
}
