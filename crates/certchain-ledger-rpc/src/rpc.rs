//! A small JSON-RPC 2.0 client over HTTP.

use std::{
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct Request<'a> {
  jsonrpc: &'static str,
  id:      u64,
  method:  &'a str,
  params:  Value,
}

#[derive(Debug, Deserialize)]
struct Response {
  #[serde(default)]
  result: Value,
  error:  Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
  code:    i64,
  message: String,
}

/// JSON-RPC client bound to one endpoint. Request ids increase per client.
pub struct RpcClient {
  http:    Client,
  url:     String,
  next_id: AtomicU64,
}

impl RpcClient {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
    let http = Client::builder().timeout(timeout).build()?;
    Ok(Self { http, url: url.into(), next_id: AtomicU64::new(1) })
  }

  /// Call `method` and deserialise its `result`. A `null` result
  /// deserialises into `Option::None` where the caller asks for an option.
  pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(id, method, "json-rpc request");

    let response: Response = self
      .http
      .post(&self.url)
      .json(&Request { jsonrpc: "2.0", id, method, params })
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    if let Some(error) = response.error {
      return Err(Error::Rpc { code: error.code, message: error.message });
    }
    Ok(serde_json::from_value(response.result)?)
  }
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`.
pub fn parse_quantity(s: &str) -> Result<u64> {
  let digits = s
    .strip_prefix("0x")
    .ok_or_else(|| Error::Abi(format!("quantity {s:?} lacks 0x prefix")))?;
  u64::from_str_radix(digits, 16)
    .map_err(|e| Error::Abi(format!("invalid quantity {s:?}: {e}")))
}
