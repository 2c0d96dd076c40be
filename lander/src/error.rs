use std::time::Duration;

use synapse_core::{ChainCommunicationError, Nonce, TransactionReceipt, H256};
use synapse_signer::SignerError;

/// Result alias used throughout the lander.
pub type LanderResult<T> = Result<T, LanderError>;

/// The category a failure belongs to, which decides what the caller may do
/// next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Settings were rejected before any network call
    InvalidConfig,
    /// Failed before transmission; the nonce was reclaimed
    Local,
    /// The node refused the transaction outright
    Rejected,
    /// Transient send failures persisted past the retry budget
    RetriesExhausted,
    /// The transaction may still land; the nonce is held
    Ambiguous,
    /// Included on chain with a failure status; the nonce is consumed
    OnChain,
    /// The caller cancelled the operation
    Cancelled,
    /// A receipt or payload could not be decoded
    Decode,
}

#[derive(Debug, thiserror::Error)]
pub enum LanderError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("chain id mismatch: provider reports {actual} but {network} expects {expected}")]
    ChainIdMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },
    #[error("failed to refresh nonce: {0}")]
    NonceRefresh(#[source] ChainCommunicationError),
    #[error("gas estimation failed: {0}")]
    GasEstimation(#[source] ChainCommunicationError),
    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    ChainCommunicationError(#[from] ChainCommunicationError),
    #[error("non-retryable error: {0}")]
    NonRetryable(#[source] ChainCommunicationError),
    #[error("max retries exceeded after {attempts} attempts: {source}")]
    MaxRetriesExceeded {
        attempts: u32,
        #[source]
        source: ChainCommunicationError,
    },
    #[error("timeout waiting for transaction receipt after {polls} polls")]
    ReceiptTimeout { tx_hash: H256, polls: u32 },
    #[error("receipt fetch failed due to repeated RPC errors ({errors} consecutive): {source}")]
    ReceiptRpcFailure {
        tx_hash: H256,
        errors: u32,
        #[source]
        source: ChainCommunicationError,
    },
    #[error("transaction {tx_hash:?} failed with status {status}")]
    FailedOnChain {
        tx_hash: H256,
        status: u64,
        receipt: Box<TransactionReceipt>,
    },
    #[error("transaction {tx_hash:?} with nonce {nonce} is in an unknown state: {source}")]
    UnknownPending {
        tx_hash: H256,
        nonce: Nonce,
        #[source]
        source: Box<LanderError>,
    },
    #[error("condition not met within {timeout:?}")]
    PollTimeout { timeout: Duration },
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("{operation}: {source}")]
    Context {
        operation: &'static str,
        #[source]
        source: Box<LanderError>,
    },
}

impl LanderError {
    /// Wrap with the name of the operation that failed. The category is
    /// preserved.
    pub fn with_context(self, operation: &'static str) -> Self {
        LanderError::Context {
            operation,
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> FailureKind {
        use LanderError::*;
        match self {
            InvalidConfig(_) | ChainIdMismatch { .. } => FailureKind::InvalidConfig,
            NonceRefresh(_)
            | GasEstimation(_)
            | Signing(_)
            | InvalidInput(_)
            | LanderError::ChainCommunicationError(_) => FailureKind::Local,
            NonRetryable(_) => FailureKind::Rejected,
            MaxRetriesExceeded { .. } => FailureKind::RetriesExhausted,
            ReceiptTimeout { .. } | ReceiptRpcFailure { .. } | PollTimeout { .. } => {
                FailureKind::Ambiguous
            }
            FailedOnChain { .. } => FailureKind::OnChain,
            Decode { .. } => FailureKind::Decode,
            Cancelled => FailureKind::Cancelled,
            UnknownPending { source, .. } | Context { source, .. } => source.kind(),
        }
    }

    /// The receipt of a transaction that was included but failed.
    pub fn receipt(&self) -> Option<&TransactionReceipt> {
        match self {
            LanderError::FailedOnChain { receipt, .. } => Some(receipt.as_ref()),
            LanderError::UnknownPending { source, .. } | LanderError::Context { source, .. } => {
                source.receipt()
            }
            _ => None,
        }
    }

    /// True when a transaction may be live in the network with a nonce the
    /// manager still holds as pending. Callers should reconcile with
    /// `NonceManager::reset` before trusting local nonce state again.
    pub fn nonce_may_be_live(&self) -> bool {
        match self {
            LanderError::UnknownPending { .. } => true,
            LanderError::Context { source, .. } => source.nonce_may_be_live(),
            other => other.kind() == FailureKind::Ambiguous,
        }
    }
}

/// Adds operation context to lander results.
pub trait ResultExt<T> {
    fn context(self, operation: &'static str) -> LanderResult<T>;
}

impl<T, E: Into<LanderError>> ResultExt<T> for Result<T, E> {
    fn context(self, operation: &'static str) -> LanderResult<T> {
        self.map_err(|e| e.into().with_context(operation))
    }
}
