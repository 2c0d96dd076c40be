use std::any::Any;
use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

/// The result of interacting with a chain.
pub type ChainResult<T> = Result<T, ChainCommunicationError>;

/// An "Any"-typed error.
pub trait SynapseCustomError: StdError + Send + Sync + Any {}

impl<E: StdError + Send + Sync + Any> SynapseCustomError for E {}

/// Thin wrapper around a boxed SynapseCustomError so it can sit inside
/// `ChainCommunicationError` variants.
#[repr(transparent)]
pub struct SynapseCustomErrorWrapper(Box<dyn SynapseCustomError>);

impl Debug for SynapseCustomErrorWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", AsRef::<dyn SynapseCustomError>::as_ref(&self))
    }
}

impl Display for SynapseCustomErrorWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", AsRef::<dyn SynapseCustomError>::as_ref(&self))
    }
}

impl StdError for SynapseCustomErrorWrapper {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl AsRef<dyn SynapseCustomError> for SynapseCustomErrorWrapper {
    fn as_ref(&self) -> &dyn SynapseCustomError {
        self.0.as_ref()
    }
}

impl Deref for SynapseCustomErrorWrapper {
    type Target = Box<dyn SynapseCustomError>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// ChainCommunicationError contains errors returned when attempting to
/// call a chain or dispatch a transaction
#[derive(Debug, thiserror::Error)]
pub enum ChainCommunicationError {
    /// Provider Error
    #[error(transparent)]
    ProviderError(#[from] ethers::providers::ProviderError),
    /// The node returned a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpcError {
        /// Error code reported by the node
        code: i64,
        /// Error message reported by the node
        message: String,
    },
    /// Any other error; does not implement `From` to prevent
    /// conflicting/absorbing other errors.
    #[error(transparent)]
    Other(SynapseCustomErrorWrapper),
    /// A free-form error message, typically produced by test doubles or
    /// by nodes that only return text
    #[error("{0}")]
    Message(String),
}

impl ChainCommunicationError {
    /// Create a chain communication error from any other existing error
    pub fn from_other<E: SynapseCustomError>(err: E) -> Self {
        Self::Other(SynapseCustomErrorWrapper(Box::new(err)))
    }

    /// Creates a chain communication error carrying an arbitrary message
    pub fn msg(err: impl Into<String>) -> Self {
        Self::Message(err.into())
    }
}
