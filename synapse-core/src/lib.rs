//! Primitives shared by every synapse crate: the chain error type, the ledger
//! RPC collaborator trait and the network registry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used, clippy::panic)]

pub use error::*;
pub use network::*;
pub use traits::*;
pub use types::*;

mod error;
mod network;
mod traits;
mod types;
