//! Ethers-backed implementation of the ledger provider used by the lander.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used, clippy::panic)]

pub use provider::*;

mod provider;
