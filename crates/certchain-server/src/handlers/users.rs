//! Handlers for registration and the current user.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/auth/register` | Public. Body: `{email,password,name,surname,iin}` |
//! | `GET`  | `/api/users/me` | Authenticated |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use certchain_core::{
  identity::{Identity, NewIdentity, is_valid_email, is_valid_iin},
  ledger::Ledger,
  store::CertificateStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::{Authenticated, hash_password},
  error::{Error, Result},
};

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterBody {
  pub email:    String,
  pub password: String,
  pub name:     String,
  pub surname:  String,
  pub iin:      String,
}

impl RegisterBody {
  fn validate(&self) -> Result<()> {
    for (field, value) in [
      ("email", &self.email),
      ("password", &self.password),
      ("name", &self.name),
      ("surname", &self.surname),
      ("iin", &self.iin),
    ] {
      if value.trim().is_empty() {
        return Err(Error::BadRequest(format!("{field} is required")));
      }
    }
    if !is_valid_email(&self.email) {
      return Err(Error::BadRequest("invalid email format".into()));
    }
    if !is_valid_iin(&self.iin) {
      return Err(Error::BadRequest("iin must be exactly 12 digits".into()));
    }
    Ok(())
  }
}

/// `POST /api/auth/register`
pub async fn register<S, L>(
  State(state): State<AppState<S, L>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  body.validate()?;

  if state
    .store
    .find_identity_by_iin(&body.iin)
    .await
    .map_err(Error::store)?
    .is_some()
  {
    return Err(Error::Conflict("a user with this IIN already exists".into()));
  }
  if state
    .store
    .find_identity_by_email(&body.email)
    .await
    .map_err(Error::store)?
    .is_some()
  {
    return Err(Error::Conflict("a user with this email already exists".into()));
  }

  let identity = state
    .store
    .register(NewIdentity {
      password_hash: hash_password(&body.password)?,
      email:         body.email,
      name:          body.name,
      surname:       body.surname,
      iin:           body.iin,
    })
    .await
    .map_err(|e| registration_error(&*state.store, e))?;

  tracing::info!(user_id = %identity.user_id, "registered user");
  Ok((StatusCode::CREATED, Json(identity)))
}

/// A registration that lost a race for the same IIN or email is still a
/// conflict, not a store failure.
fn registration_error<S: CertificateStore>(store: &S, error: S::Error) -> Error {
  if store.is_duplicate(&error) {
    Error::Conflict(error.to_string())
  } else {
    Error::store(error)
  }
}

// ─── Me ──────────────────────────────────────────────────────────────────────

/// `GET /api/users/me`
pub async fn me<S, L>(
  State(state): State<AppState<S, L>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Identity>>
where
  S: CertificateStore + 'static,
  L: Ledger + 'static,
{
  let identity = state
    .store
    .find_identity_by_email(&caller.email)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound("user".into()))?;
  Ok(Json(identity))
}

#[cfg(test)]
mod tests {
  use certchain_store_sqlite::SqliteStore;

  use super::*;

  fn identity(iin: &str, email: &str) -> NewIdentity {
    NewIdentity {
      email:         email.into(),
      password_hash: "x".into(),
      name:          "Aigerim".into(),
      surname:       "Nurlanova".into(),
      iin:           iin.into(),
    }
  }

  #[tokio::test]
  async fn racing_registration_is_a_conflict() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .register(identity("111111111111", "a@example.com"))
      .await
      .unwrap();

    // The second insert passed the pre-check before the first committed.
    let err = store
      .register(identity("111111111111", "b@example.com"))
      .await
      .unwrap_err();
    let err = registration_error(&store, err);
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
  }
}
