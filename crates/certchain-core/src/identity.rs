//! Identity records and the identity resolver.
//!
//! Identities are keyed by a stable natural identifier, the 12-digit IIN.
//! Certificates never reference a live identity for hashing: they carry an
//! [`IdentitySnapshot`] taken at issuance.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, store::CertificateStore};

/// Length of a national identification number.
pub const IIN_LEN: usize = 12;

/// A registered user, as exposed outside the store. The password hash is not
/// part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub user_id:    Uuid,
  pub email:      String,
  pub name:       String,
  pub surname:    String,
  pub iin:        String,
  pub is_admin:   bool,
  pub created_at: DateTime<Utc>,
}

impl Identity {
  pub fn snapshot(&self) -> IdentitySnapshot {
    IdentitySnapshot {
      iin:     self.iin.clone(),
      name:    self.name.clone(),
      surname: self.surname.clone(),
    }
  }
}

/// Input to [`CertificateStore::register`]. `user_id` and `created_at` are set
/// by the store; new identities are never admins.
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub email:         String,
  /// Argon2 PHC string; hashing happens before this reaches the store.
  pub password_hash: String,
  pub name:          String,
  pub surname:       String,
  pub iin:           String,
}

/// The identity fields frozen onto a certificate row at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
  pub iin:     String,
  pub name:    String,
  pub surname: String,
}

/// Which side of a certificate an identity is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
  Issuer,
  Recipient,
}

impl fmt::Display for Party {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Issuer => f.write_str("issuer"),
      Self::Recipient => f.write_str("recipient"),
    }
  }
}

/// `true` if `iin` is exactly twelve ASCII digits.
pub fn is_valid_iin(iin: &str) -> bool {
  iin.len() == IIN_LEN && iin.bytes().all(|b| b.is_ascii_digit())
}

/// Loose structural email check: `local@domain.tld` with an alphabetic TLD of
/// at least two characters and no whitespace.
pub fn is_valid_email(email: &str) -> bool {
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };
  if local.is_empty() || domain.contains('@') {
    return false;
  }
  if email.chars().any(char::is_whitespace) {
    return false;
  }
  match domain.rsplit_once('.') {
    Some((host, tld)) => {
      !host.is_empty()
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
    }
    None => false,
  }
}

/// Resolve an IIN to an identity, failing with
/// [`Error::IdentityNotFound`] when it is unknown.
pub async fn resolve<S>(store: &S, party: Party, iin: &str) -> Result<Identity>
where
  S: CertificateStore,
{
  store
    .find_identity_by_iin(iin)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::IdentityNotFound { party, iin: iin.to_owned() })
}
