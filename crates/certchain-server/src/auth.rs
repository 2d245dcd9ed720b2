//! HTTP Basic-auth extractor and argon2 password helpers.
//!
//! Users authenticate with their email address and password; the stored
//! argon2 PHC string is fetched from the identity store per request.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use certchain_core::{
  Error as CoreError, access::Caller, ledger::Ledger, store::CertificateStore,
};
use rand_core::OsRng;

use crate::{AppState, error::Error};

/// The authenticated caller. Present in a handler means the request carried
/// valid credentials.
pub struct Authenticated(pub Caller);

fn unauthenticated() -> Error { Error::Core(CoreError::Unauthenticated) }

/// Extract `(email, password)` from an `Authorization: Basic` header.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(unauthenticated)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or_else(unauthenticated)?;

  let decoded = B64.decode(encoded).map_err(|_| unauthenticated())?;
  let creds   = String::from_utf8(decoded).map_err(|_| unauthenticated())?;

  let (email, password) = creds.split_once(':').ok_or_else(unauthenticated)?;
  Ok((email.to_owned(), password.to_owned()))
}

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, Error> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, phc: &str) -> Result<(), Error> {
  let parsed_hash = PasswordHash::new(phc).map_err(|_| unauthenticated())?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| unauthenticated())
}

impl<S, L> FromRequestParts<AppState<S, L>> for Authenticated
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, L>,
  ) -> Result<Self, Self::Rejection> {
    let (email, password) = basic_credentials(&parts.headers)?;

    let (identity, phc) = state
      .store
      .credentials(&email)
      .await
      .map_err(Error::store)?
      .ok_or_else(unauthenticated)?;
    verify_password(&password, &phc)?;

    Ok(Authenticated(Caller::from(&identity)))
  }
}
