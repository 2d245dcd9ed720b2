//! Ethereum JSON-RPC backend for the certchain ledger.
//!
//! Talks to a node that manages the sending account (`eth_sendTransaction`)
//! and to the certificate registry contract through its ABI:
//!
//! - `issueCertificate(string,string,string,uint8,bytes32,bytes32,uint256)`
//! - `getCertificate(string) returns (string,string,string,uint8,bytes32,bytes32,uint256)`

pub mod abi;
pub mod error;

mod ledger;
mod rpc;

pub use error::{Error, Result};
pub use ledger::{RpcLedger, RpcLedgerConfig};
