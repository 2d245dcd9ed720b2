//! Core types, collaborator traits and the issuance/verification protocol for
//! certchain.
//!
//! This crate has no HTTP or database dependencies. Storage
//! backends implement [`store::CertificateStore`]; ledger backends implement
//! [`ledger::Ledger`]. The server crate wires concrete backends into
//! [`issue::Coordinator`] and [`verify::Verifier`].

pub mod access;
pub mod certificate;
pub mod commitment;
pub mod error;
pub mod identity;
pub mod issue;
pub mod ledger;
pub mod store;
pub mod verify;

pub use error::{BoxError, Error, Result};

#[cfg(test)]
mod tests;
