use std::fmt::Display;

/// Signatures of failures that usually clear up on their own.
const RETRYABLE_PATTERNS: &[&str] = &[
    "nonce too low",
    "replacement transaction underpriced",
    "already known",
    "timeout",
    "timed out",
    "connection refused",
    "connection reset",
    "broken pipe",
    "i/o timeout",
];

const NONCE_PATTERNS: &[&str] = &["nonce too low", "nonce too high", "invalid nonce"];

const GAS_PATTERNS: &[&str] = &["gas", "fee"];

const ALREADY_KNOWN_PATTERNS: &[&str] = &["already known"];

fn matches_any(err: &(impl Display + ?Sized), patterns: &[&str]) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    if msg.is_empty() {
        return false;
    }
    patterns.iter().any(|p| msg.contains(p))
}

/// Whether retrying the same operation unchanged may succeed.
pub fn is_retryable_error(err: &(impl Display + ?Sized)) -> bool {
    matches_any(err, RETRYABLE_PATTERNS)
}

/// Whether the node disagrees with the nonce we used.
pub fn is_nonce_error(err: &(impl Display + ?Sized)) -> bool {
    matches_any(err, NONCE_PATTERNS)
}

/// Whether the failure is about gas limits or fees.
pub fn is_gas_error(err: &(impl Display + ?Sized)) -> bool {
    matches_any(err, GAS_PATTERNS)
}

/// Whether the node already holds this exact signed transaction.
pub fn is_already_known(err: &(impl Display + ?Sized)) -> bool {
    matches_any(err, ALREADY_KNOWN_PATTERNS)
}

/// Coarse cause of a failure, for logs and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCause {
    Nonce,
    Gas,
    Other,
}

impl ErrorCause {
    pub fn of(err: &(impl Display + ?Sized)) -> Self {
        if is_nonce_error(err) {
            ErrorCause::Nonce
        } else if is_gas_error(err) {
            ErrorCause::Gas
        } else {
            ErrorCause::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCause::Nonce => "nonce",
            ErrorCause::Gas => "gas",
            ErrorCause::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use synapse_core::ChainCommunicationError;

    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        for msg in [
            "nonce too low",
            "Replacement Transaction Underpriced",
            "ALREADY KNOWN",
            "request timeout",
            "dial tcp 1.2.3.4:443: connect: connection refused",
            "read: connection reset by peer",
            "write: broken pipe",
            "i/o timeout",
        ] {
            assert!(is_retryable_error(msg), "{msg}");
        }
    }

    #[test]
    fn rejections_are_not_retryable() {
        for msg in [
            "insufficient funds for gas * price + value",
            "execution reverted",
            "nonce too high",
            "",
        ] {
            assert!(!is_retryable_error(msg), "{msg}");
        }
    }

    #[test]
    fn classifies_cause() {
        assert!(is_nonce_error("invalid nonce"));
        assert!(is_nonce_error("Nonce Too High"));
        assert!(!is_nonce_error("nonce"));
        assert!(is_gas_error("intrinsic gas too low"));
        assert!(is_gas_error("max fee per gas less than block base fee"));
        assert_eq!(ErrorCause::of("nonce too low"), ErrorCause::Nonce);
        assert_eq!(ErrorCause::of("out of gas"), ErrorCause::Gas);
        assert_eq!(ErrorCause::of("boom"), ErrorCause::Other);
    }

    #[test]
    fn empty_messages_match_nothing() {
        let err = ChainCommunicationError::msg("");
        assert!(!is_retryable_error(&err));
        assert!(!is_nonce_error(&err));
        assert!(!is_gas_error(&err));
        assert!(!is_already_known(&err));
    }

    #[test]
    fn works_on_rpc_errors() {
        let err = ChainCommunicationError::JsonRpcError {
            code: -32000,
            message: "already known".into(),
        };
        assert!(is_already_known(&err));
        assert!(is_retryable_error(&err));
    }
}
