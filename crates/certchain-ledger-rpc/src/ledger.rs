//! [`RpcLedger`]: the [`Ledger`] implementation backed by an Ethereum node.

use std::time::Duration;

use certchain_core::ledger::{Ledger, LedgerCommitment, LedgerEntry, PendingTx, TxReceipt};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  abi::{decode_certificate, decode_hex, encode_get_certificate, encode_issue_certificate},
  rpc::{RpcClient, parse_quantity},
};

// ─── Config ──────────────────────────────────────────────────────────────────

fn default_confirmations() -> u64 { 1 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_confirmation_timeout_secs() -> u64 { 120 }
fn default_request_timeout_secs() -> u64 { 30 }

/// Connection settings for the node and the registry contract.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcLedgerConfig {
  pub rpc_url:                   String,
  /// Address of the certificate registry contract.
  pub contract_address:          String,
  /// Node-managed account that signs and pays for `issueCertificate`.
  pub from_address:              String,
  /// Blocks, including the one holding the transaction, before it counts as
  /// confirmed.
  #[serde(default = "default_confirmations")]
  pub confirmations:             u64,
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms:          u64,
  #[serde(default = "default_confirmation_timeout_secs")]
  pub confirmation_timeout_secs: u64,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs:      u64,
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
  block_number: Option<String>,
  status:       Option<String>,
}

/// A ledger on an EVM chain reached over JSON-RPC.
pub struct RpcLedger {
  client: RpcClient,
  config: RpcLedgerConfig,
}

impl RpcLedger {
  pub fn new(config: RpcLedgerConfig) -> Result<Self> {
    let client = RpcClient::new(
      config.rpc_url.clone(),
      Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Self { client, config })
  }

  /// One look at the receipt. `Ok(None)` means not yet final.
  async fn poll_receipt(&self, tx_ref: &str) -> Result<Option<TxReceipt>> {
    let receipt: Option<RawReceipt> = self
      .client
      .request("eth_getTransactionReceipt", json!([tx_ref]))
      .await?;

    let Some(receipt) = receipt else {
      return Ok(None);
    };
    let Some(block_hex) = receipt.block_number else {
      return Ok(None);
    };
    if receipt.status.as_deref() == Some("0x0") {
      return Err(Error::Reverted(tx_ref.to_owned()));
    }

    let block_number = parse_quantity(&block_hex)?;
    let head: String = self.client.request("eth_blockNumber", json!([])).await?;
    let head = parse_quantity(&head)?;

    let confirmations = head.saturating_sub(block_number) + 1;
    if confirmations < self.config.confirmations.max(1) {
      debug!(tx_ref, confirmations, "waiting for more confirmations");
      return Ok(None);
    }
    Ok(Some(TxReceipt { tx_ref: tx_ref.to_owned(), block_number: Some(block_number) }))
  }
}

impl Ledger for RpcLedger {
  type Error = Error;

  async fn submit(&self, entry: LedgerEntry) -> Result<PendingTx> {
    let data = encode_issue_certificate(&entry);
    let tx_ref: String = self
      .client
      .request(
        "eth_sendTransaction",
        json!([{
          "from": self.config.from_address,
          "to":   self.config.contract_address,
          "data": format!("0x{}", hex::encode(data)),
        }]),
      )
      .await?;

    debug!(certificate_id = %entry.certificate_id, tx_ref = %tx_ref, "transaction sent");
    Ok(PendingTx { certificate_id: entry.certificate_id, tx_ref })
  }

  /// Poll until the receipt has the configured confirmations. Transport
  /// errors are retried until the deadline; RPC errors and reverts are not.
  async fn await_confirmation(&self, pending: PendingTx) -> Result<TxReceipt> {
    let interval = Duration::from_millis(self.config.poll_interval_ms);
    let deadline =
      Instant::now() + Duration::from_secs(self.config.confirmation_timeout_secs);

    loop {
      match self.poll_receipt(&pending.tx_ref).await {
        Ok(Some(receipt)) => return Ok(receipt),
        Ok(None) => {}
        Err(Error::Transport(e)) => {
          warn!(tx_ref = %pending.tx_ref, error = %e, "receipt poll failed; retrying");
        }
        Err(e) => return Err(e),
      }

      if Instant::now() + interval > deadline {
        return Err(Error::ConfirmationTimeout(pending.tx_ref));
      }
      tokio::time::sleep(interval).await;
    }
  }

  /// Only a timeout leaves the outcome open; a reverted receipt is final.
  fn is_indeterminate(&self, error: &Error) -> bool {
    matches!(error, Error::ConfirmationTimeout(_))
  }

  async fn get_commitment(&self, certificate_id: Uuid) -> Result<Option<LedgerCommitment>> {
    let data = encode_get_certificate(certificate_id);
    let result: Result<String> = self
      .client
      .request(
        "eth_call",
        json!([
          {
            "to":   self.config.contract_address,
            "data": format!("0x{}", hex::encode(data)),
          },
          "latest",
        ]),
      )
      .await;

    match result {
      Ok(returned) => decode_certificate(&decode_hex(&returned)?),
      Err(e) if e.is_revert() => {
        debug!(%certificate_id, error = %e, "getCertificate reverted; treating as absent");
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }
}
