//! In-process ledger used for development and tests.
//!
//! Behaves like an append-only contract: a certificate id can be committed
//! once, blocks advance by one per confirmed transaction, and nothing is
//! updated afterwards except through the explicit [`MemoryLedger::tamper`]
//! hook. Failures can be injected for the next submission or confirmation.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use uuid::Uuid;

use super::{Ledger, LedgerCommitment, LedgerEntry, PendingTx, TxReceipt};

#[derive(Debug, Error)]
pub enum MemoryLedgerError {
  #[error("certificate {0} is already committed")]
  AlreadyCommitted(Uuid),

  #[error("unknown transaction {0}")]
  UnknownTransaction(String),

  #[error("injected failure: {0}")]
  Injected(String),

  #[error("ledger is unreachable")]
  Unreachable,

  #[error("timed out waiting for transaction {0}")]
  Timeout(String),
}

#[derive(Default)]
struct Inner {
  pending:           HashMap<String, LedgerEntry>,
  committed:         HashMap<Uuid, LedgerCommitment>,
  block_number:      u64,
  tx_counter:        u64,
  fail_submit:       Option<String>,
  fail_confirmation: Option<String>,
  /// `Some(lands)`: the next confirmation times out, and the transaction is
  /// committed anyway when `lands` is set.
  time_out:          Option<bool>,
  unreachable:       bool,
}

impl Inner {
  fn commit(&mut self, entry: LedgerEntry) -> u64 {
    self.block_number += 1;
    self
      .committed
      .insert(entry.certificate_id, LedgerCommitment::from(entry));
    self.block_number
  }
}

/// An append-only in-memory ledger.
///
/// Cloning is cheap and clones share state.
#[derive(Clone, Default)]
pub struct MemoryLedger {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryLedger {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Make the next [`Ledger::submit`] fail with `reason`.
  pub fn fail_next_submit(&self, reason: impl Into<String>) {
    self.lock().fail_submit = Some(reason.into());
  }

  /// Make the next [`Ledger::await_confirmation`] fail with `reason`. The
  /// pending transaction is dropped, as if it never made it into a block.
  pub fn fail_next_confirmation(&self, reason: impl Into<String>) {
    self.lock().fail_confirmation = Some(reason.into());
  }

  /// Make the next [`Ledger::await_confirmation`] time out. With `lands` the
  /// transaction is committed regardless, as if it was mined just after the
  /// deadline; without it the transaction stays pending forever.
  pub fn time_out_next_confirmation(&self, lands: bool) {
    self.lock().time_out = Some(lands);
  }

  /// While set, every call fails with [`MemoryLedgerError::Unreachable`].
  pub fn set_unreachable(&self, unreachable: bool) {
    self.lock().unreachable = unreachable;
  }

  /// Overwrite a committed record in place, simulating tampering on the
  /// ledger side. Returns `false` if there is no such record.
  pub fn tamper(
    &self,
    certificate_id: Uuid,
    f: impl FnOnce(&mut LedgerCommitment),
  ) -> bool {
    match self.lock().committed.get_mut(&certificate_id) {
      Some(record) => {
        f(record);
        true
      }
      None => false,
    }
  }

  /// Number of committed records.
  pub fn len(&self) -> usize { self.lock().committed.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Current block height.
  pub fn block_number(&self) -> u64 { self.lock().block_number }
}

impl Ledger for MemoryLedger {
  type Error = MemoryLedgerError;

  async fn submit(&self, entry: LedgerEntry) -> Result<PendingTx, Self::Error> {
    let mut inner = self.lock();
    if inner.unreachable {
      return Err(MemoryLedgerError::Unreachable);
    }
    if let Some(reason) = inner.fail_submit.take() {
      return Err(MemoryLedgerError::Injected(reason));
    }

    let id = entry.certificate_id;
    let already_pending = inner.pending.values().any(|e| e.certificate_id == id);
    if inner.committed.contains_key(&id) || already_pending {
      return Err(MemoryLedgerError::AlreadyCommitted(id));
    }

    inner.tx_counter += 1;
    let tx_ref = format!("0x{:064x}", inner.tx_counter);
    inner.pending.insert(tx_ref.clone(), entry);

    Ok(PendingTx { certificate_id: id, tx_ref })
  }

  async fn await_confirmation(
    &self,
    pending: PendingTx,
  ) -> Result<TxReceipt, Self::Error> {
    let mut inner = self.lock();
    if inner.unreachable {
      return Err(MemoryLedgerError::Unreachable);
    }

    let entry = inner
      .pending
      .remove(&pending.tx_ref)
      .ok_or_else(|| MemoryLedgerError::UnknownTransaction(pending.tx_ref.clone()))?;

    if let Some(reason) = inner.fail_confirmation.take() {
      return Err(MemoryLedgerError::Injected(reason));
    }

    match inner.time_out.take() {
      Some(true) => {
        inner.commit(entry);
        Err(MemoryLedgerError::Timeout(pending.tx_ref))
      }
      Some(false) => {
        inner.pending.insert(pending.tx_ref.clone(), entry);
        Err(MemoryLedgerError::Timeout(pending.tx_ref))
      }
      None => {
        let block_number = inner.commit(entry);
        Ok(TxReceipt { tx_ref: pending.tx_ref, block_number: Some(block_number) })
      }
    }
  }

  fn is_indeterminate(&self, error: &MemoryLedgerError) -> bool {
    matches!(error, MemoryLedgerError::Timeout(_))
  }

  async fn get_commitment(
    &self,
    certificate_id: Uuid,
  ) -> Result<Option<LedgerCommitment>, Self::Error> {
    let inner = self.lock();
    if inner.unreachable {
      return Err(MemoryLedgerError::Unreachable);
    }
    Ok(inner.committed.get(&certificate_id).cloned())
  }
}
