//! Commitment derivation: the two digests anchored on the ledger.
//!
//! Both digests are Keccak-256 over a plain UTF-8 concatenation of fields with
//! no separator, which is what the contract data already on chain was built
//! from. The missing separator is a known weakness: `("ab", "c")` and
//! `("a", "bc")` commit to the same digest. It is kept so that digests stay
//! comparable with existing ledger entries; do not "fix" it here without a
//! versioned migration of the ledger data.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest as _, Keccak256};

use crate::{
  Error, Result,
  certificate::{Certificate, IssuerKind},
  identity::IdentitySnapshot,
};

// ─── Digest ──────────────────────────────────────────────────────────────────

/// A 32-byte Keccak-256 output.
///
/// Rendered as `0x`-prefixed lowercase hex, the form in which the ledger
/// returns `bytes32` values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
  pub const fn from_bytes(bytes: [u8; 32]) -> Self { Self(bytes) }

  pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }

  pub fn to_hex(&self) -> String { format!("0x{}", hex::encode(self.0)) }

  /// Parse a 64-digit hex string, with or without the `0x` prefix.
  pub fn parse_hex(s: &str) -> Result<Self> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out)
      .map_err(|e| Error::Validation(format!("invalid digest {s:?}: {e}")))?;
    Ok(Self(out))
  }
}

impl fmt::Display for Digest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for Digest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Digest({})", self.to_hex())
  }
}

impl FromStr for Digest {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse_hex(s) }
}

impl Serialize for Digest {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for Digest {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Self::parse_hex(&s).map_err(serde::de::Error::custom)
  }
}

// ─── Derivation ──────────────────────────────────────────────────────────────

fn keccak(parts: &[&str]) -> Digest {
  let mut hasher = Keccak256::new();
  for part in parts {
    hasher.update(part.as_bytes());
  }
  let mut out = [0u8; 32];
  out.copy_from_slice(&hasher.finalize());
  Digest(out)
}

/// `keccak256(theme || body)`.
pub fn certificate_hash(theme: &str, body: &str) -> Digest {
  keccak(&[theme, body])
}

/// `keccak256(iin || name || surname)` for a person, and
/// `keccak256(iin || name || surname || bin || organisation_name)` for an
/// organisation. Field order is part of the ledger format.
pub fn issuer_hash(issuer: &IdentitySnapshot, kind: &IssuerKind) -> Digest {
  match kind {
    IssuerKind::Person => keccak(&[&issuer.iin, &issuer.name, &issuer.surname]),
    IssuerKind::Organization { organisation_name, bin } => keccak(&[
      &issuer.iin,
      &issuer.name,
      &issuer.surname,
      bin,
      organisation_name,
    ]),
  }
}

/// The pair of digests committed to the ledger for one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitments {
  pub certificate_hash: Digest,
  pub issuer_hash:      Digest,
}

impl Commitments {
  pub fn derive(
    issuer: &IdentitySnapshot,
    kind: &IssuerKind,
    theme: &str,
    body: &str,
  ) -> Self {
    Self {
      certificate_hash: certificate_hash(theme, body),
      issuer_hash:      issuer_hash(issuer, kind),
    }
  }

  /// Re-derive from a stored certificate, using the issuer snapshot frozen on
  /// the row rather than any live identity.
  pub fn of_certificate(cert: &Certificate) -> Self {
    Self::derive(
      &cert.issuer,
      &cert.issuer_kind,
      &cert.certificate_theme,
      &cert.certificate_body,
    )
  }
}
