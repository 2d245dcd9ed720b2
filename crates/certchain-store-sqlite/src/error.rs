//! Error type for `certchain-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column holds a value the domain types cannot represent.
  #[error("invalid stored value: {0}")]
  Decode(String),

  /// Registration hit an existing IIN or email.
  #[error("an identity with this {field} already exists: {value}")]
  Duplicate { field: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
