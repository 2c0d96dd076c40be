//! Reliable transaction submission for a single EVM sender.
//!
//! The pieces compose bottom-up: [`txutil`] holds the nonce manager, error
//! classifier, backoff, submission retrier and receipt waiter;
//! [`orchestrator`] ties them into one nonce-safe submission protocol;
//! [`pdp`] drives the data-set contract through that protocol.

#![deny(clippy::unwrap_used, clippy::panic)]

pub use error::{FailureKind, LanderError, LanderResult, ResultExt};
pub use metrics::LanderMetrics;
pub use orchestrator::{ContractCall, Stage, Submission, TransactionOrchestrator};
pub use pdp::{DataSetCreated, DataSetManager, PieceCid, PiecesAdded};
pub use settings::{load_settings, LanderSettings, ReceiptWaitConfig, RetryConfig};
pub use txutil::{NonceGuard, NonceManager, ReceiptWaiter, SubmissionRetrier};

mod error;
pub mod metrics;
pub mod orchestrator;
pub mod pdp;
pub mod settings;
pub mod txutil;
