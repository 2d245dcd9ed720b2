//! Minimal Solidity ABI codec for the certificate registry contract.
//!
//! Only the types the two contract functions use are supported: `string`,
//! `uint8`/`uint256` (values that fit in a `u64`) and `bytes32`. Encoding
//! follows the standard head/tail layout; every word is 32 bytes.

use certchain_core::{
  certificate::IssuerType,
  commitment::Digest,
  ledger::{LedgerCommitment, LedgerEntry},
};
use sha3::{Digest as _, Keccak256};
use uuid::Uuid;

use crate::{Error, Result};

pub const ISSUE_CERTIFICATE: &str =
  "issueCertificate(string,string,string,uint8,bytes32,bytes32,uint256)";

pub const GET_CERTIFICATE: &str = "getCertificate(string)";

const WORD: usize = 32;

/// Number of values in the `getCertificate` return tuple.
const CERTIFICATE_FIELDS: usize = 7;

// ─── Encoding ────────────────────────────────────────────────────────────────

/// A value to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
  Str(String),
  Uint(u64),
  Bytes32([u8; 32]),
}

/// The 4-byte function selector: the first bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
  let hash = Keccak256::digest(signature.as_bytes());
  let mut out = [0u8; 4];
  out.copy_from_slice(&hash[..4]);
  out
}

fn uint_word(value: u64) -> [u8; WORD] {
  let mut word = [0u8; WORD];
  word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
  word
}

/// ABI-encode `tokens` as a parameter list.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
  let head_len = tokens.len() * WORD;
  let mut head = Vec::with_capacity(head_len);
  let mut tail = Vec::new();

  for token in tokens {
    match token {
      Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
      Token::Bytes32(bytes) => head.extend_from_slice(bytes),
      Token::Str(s) => {
        head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
        tail.extend_from_slice(&uint_word(s.len() as u64));
        tail.extend_from_slice(s.as_bytes());
        tail.resize(tail.len().next_multiple_of(WORD), 0);
      }
    }
  }

  head.extend_from_slice(&tail);
  head
}

/// Call data for a function: selector followed by the encoded arguments.
pub fn call_data(signature: &str, tokens: &[Token]) -> Vec<u8> {
  let mut data = selector(signature).to_vec();
  data.extend_from_slice(&encode(tokens));
  data
}

fn entry_tokens(entry: &LedgerEntry) -> Vec<Token> {
  vec![
    Token::Str(entry.certificate_id.to_string()),
    Token::Str(entry.recipient_iin.clone()),
    Token::Str(entry.issuer_iin.clone()),
    Token::Uint(u64::from(entry.issuer_type.code())),
    Token::Bytes32(*entry.issuer_hash.as_bytes()),
    Token::Bytes32(*entry.certificate_hash.as_bytes()),
    Token::Uint(entry.issued_at),
  ]
}

pub fn encode_issue_certificate(entry: &LedgerEntry) -> Vec<u8> {
  call_data(ISSUE_CERTIFICATE, &entry_tokens(entry))
}

pub fn encode_get_certificate(certificate_id: Uuid) -> Vec<u8> {
  call_data(GET_CERTIFICATE, &[Token::Str(certificate_id.to_string())])
}

/// What a node returns from `eth_call` for a stored record.
#[cfg(test)]
pub(crate) fn encode_certificate_return(c: &LedgerCommitment) -> Vec<u8> {
  encode(&[
    Token::Str(c.certificate_id.clone()),
    Token::Str(c.recipient_iin.clone()),
    Token::Str(c.issuer_iin.clone()),
    Token::Uint(u64::from(c.issuer_type.code())),
    Token::Bytes32(*c.issuer_hash.as_bytes()),
    Token::Bytes32(*c.certificate_hash.as_bytes()),
    Token::Uint(c.issued_at),
  ])
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Bounds-checked reader over ABI-encoded return data.
struct Reader<'a> {
  data: &'a [u8],
}

impl<'a> Reader<'a> {
  fn slice(&self, at: usize, len: usize) -> Result<&'a [u8]> {
    at.checked_add(len)
      .and_then(|end| self.data.get(at..end))
      .ok_or_else(|| {
        Error::Abi(format!(
          "need {len} bytes at offset {at}, have {}",
          self.data.len()
        ))
      })
  }

  fn word(&self, at: usize) -> Result<[u8; WORD]> {
    let mut word = [0u8; WORD];
    word.copy_from_slice(self.slice(at, WORD)?);
    Ok(word)
  }

  fn uint(&self, at: usize) -> Result<u64> {
    let word = self.word(at)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
      return Err(Error::Abi(format!("integer at offset {at} overflows u64")));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(low))
  }

  fn offset(&self, at: usize) -> Result<usize> {
    usize::try_from(self.uint(at)?)
      .map_err(|_| Error::Abi(format!("offset at {at} does not fit in usize")))
  }

  /// Read the `string` whose head word is at `base + index * 32`. Offsets are
  /// relative to `base`, the start of the enclosing tuple.
  fn string(&self, base: usize, index: usize) -> Result<String> {
    let start = base
      .checked_add(self.offset(base + index * WORD)?)
      .ok_or_else(|| Error::Abi(format!("string {index} offset overflows")))?;
    let len = self.offset(start)?;
    let data_at = start
      .checked_add(WORD)
      .ok_or_else(|| Error::Abi(format!("string {index} offset overflows")))?;
    let bytes = self.slice(data_at, len)?;
    String::from_utf8(bytes.to_vec())
      .map_err(|e| Error::Abi(format!("string {index} is not UTF-8: {e}")))
  }

  fn bytes32(&self, base: usize, index: usize) -> Result<Digest> {
    Ok(Digest::from_bytes(self.word(base + index * WORD)?))
  }
}

/// Decode the return data of `getCertificate`.
///
/// Returns `None` for empty return data and for the zero record the contract
/// yields for ids it has never seen (an empty certificate id).
pub fn decode_certificate(data: &[u8]) -> Result<Option<LedgerCommitment>> {
  if data.is_empty() {
    return Ok(None);
  }
  let reader = Reader { data };

  // A contract returning a struct wraps the fields in one dynamic tuple,
  // whose head is a single offset word of 0x20. The flat form starts with the
  // offset of the first string, which is past all seven head words.
  let base = if reader.uint(0)? == WORD as u64 { WORD } else { 0 };
  reader.slice(base, CERTIFICATE_FIELDS * WORD)?;

  let certificate_id = reader.string(base, 0)?;
  if certificate_id.is_empty() {
    return Ok(None);
  }

  let code = reader.uint(base + 3 * WORD)?;
  let issuer_type = u8::try_from(code)
    .ok()
    .and_then(IssuerType::from_code)
    .ok_or_else(|| Error::Abi(format!("unknown issuer type code {code}")))?;

  Ok(Some(LedgerCommitment {
    certificate_id,
    recipient_iin: reader.string(base, 1)?,
    issuer_iin: reader.string(base, 2)?,
    issuer_type,
    issuer_hash: reader.bytes32(base, 4)?,
    certificate_hash: reader.bytes32(base, 5)?,
    issued_at: reader.uint(base + 6 * WORD)?,
  }))
}

/// Decode a `0x`-prefixed hex string as returned by JSON-RPC.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
  Ok(hex::decode(s.strip_prefix("0x").unwrap_or(s))?)
}
