//! Error type for `certchain-ledger-rpc`.

use thiserror::Error;

/// JSON-RPC error code geth and most clients use for `execution reverted`.
const EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, Error)]
pub enum Error {
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("rpc error {code}: {message}")]
  Rpc { code: i64, message: String },

  #[error("abi decode error: {0}")]
  Abi(String),

  #[error("transaction {0} reverted")]
  Reverted(String),

  #[error("transaction {0} not confirmed before the timeout")]
  ConfirmationTimeout(String),

  #[error("hex decode error: {0}")]
  Hex(#[from] hex::FromHexError),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// `true` if the node reported that contract execution reverted.
  pub fn is_revert(&self) -> bool {
    match self {
      Self::Rpc { code, message } => {
        *code == EXECUTION_REVERTED || message.to_ascii_lowercase().contains("revert")
      }
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
