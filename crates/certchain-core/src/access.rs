//! Access gate: who may issue, read and administer.
//!
//! Authentication happens in the HTTP layer; these checks only look at the
//! resulting [`Caller`]. Verification is public and has no check here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, certificate::Certificate, identity::Identity};

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
  pub user_id:  Uuid,
  pub email:    String,
  pub iin:      String,
  pub is_admin: bool,
}

impl From<&Identity> for Caller {
  fn from(identity: &Identity) -> Self {
    Self {
      user_id:  identity.user_id,
      email:    identity.email.clone(),
      iin:      identity.iin.clone(),
      is_admin: identity.is_admin,
    }
  }
}

/// Issuing in someone's name requires being them, or an admin.
pub fn authorize_issue(caller: &Caller, issuer_iin: &str) -> Result<()> {
  if caller.is_admin || caller.iin == issuer_iin {
    return Ok(());
  }
  Err(Error::Forbidden(
    "certificates can only be issued in your own name".into(),
  ))
}

/// Certificate details are visible to its issuer, its recipient and admins.
pub fn authorize_read(caller: &Caller, certificate: &Certificate) -> Result<()> {
  if caller.is_admin
    || caller.iin == certificate.issuer.iin
    || caller.iin == certificate.recipient.iin
  {
    return Ok(());
  }
  Err(Error::Forbidden("not a party to this certificate".into()))
}

pub fn authorize_admin(caller: &Caller) -> Result<()> {
  if caller.is_admin {
    Ok(())
  } else {
    Err(Error::Forbidden("admin privileges required".into()))
  }
}

/// Changing an admin flag requires admin privileges, and an admin may not
/// revoke their own.
pub fn authorize_admin_change(caller: &Caller, target: Uuid, is_admin: bool) -> Result<()> {
  authorize_admin(caller)?;
  if target == caller.user_id && !is_admin {
    return Err(Error::Validation(
      "cannot remove admin privileges from yourself".into(),
    ));
  }
  Ok(())
}
