use std::fmt::{Display, Formatter};

use synapse_core::Nonce;
use tracing::{debug, warn};

/// Where one orchestrated submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    NonceAllocated,
    GasEstimated,
    SignedAndSent,
    AwaitingReceipt,
    Confirmed,
    /// Included with a failure status. The nonce is consumed.
    FailedOnChain,
    /// Sent, but the receipt wait did not conclude. The nonce stays pending.
    UnknownPending,
    /// Failed before the network accepted the transaction. The nonce was
    /// reclaimed, unless the node reported a nonce problem.
    LocalFailure,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Stage::Confirmed | Stage::FailedOnChain | Stage::UnknownPending | Stage::LocalFailure
        )
    }

    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (NonceAllocated, GasEstimated)
                | (NonceAllocated, LocalFailure)
                | (GasEstimated, SignedAndSent)
                | (GasEstimated, LocalFailure)
                | (SignedAndSent, AwaitingReceipt)
                | (AwaitingReceipt, Confirmed)
                | (AwaitingReceipt, FailedOnChain)
                | (AwaitingReceipt, UnknownPending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NonceAllocated => "nonce_allocated",
            Stage::GasEstimated => "gas_estimated",
            Stage::SignedAndSent => "signed_and_sent",
            Stage::AwaitingReceipt => "awaiting_receipt",
            Stage::Confirmed => "confirmed",
            Stage::FailedOnChain => "failed_on_chain",
            Stage::UnknownPending => "unknown_pending",
            Stage::LocalFailure => "local_failure",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered record of the stages one submission went through.
#[derive(Debug, Clone)]
pub(crate) struct StageLog {
    nonce: Nonce,
    stages: Vec<Stage>,
}

impl StageLog {
    pub(crate) fn new(nonce: Nonce) -> Self {
        debug!(nonce, stage = %Stage::NonceAllocated, "Submission stage");
        Self {
            nonce,
            stages: vec![Stage::NonceAllocated],
        }
    }

    pub(crate) fn current(&self) -> Stage {
        self.stages
            .last()
            .copied()
            .unwrap_or(Stage::NonceAllocated)
    }

    pub(crate) fn advance(&mut self, next: Stage) {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!(nonce = self.nonce, from = %current, to = %next, "Unexpected submission stage transition");
        }
        debug!(nonce = self.nonce, from = %current, to = %next, "Submission stage");
        self.stages.push(next);
    }

    pub(crate) fn into_stages(self) -> Vec<Stage> {
        self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_a_valid_chain() {
        let path = [
            Stage::NonceAllocated,
            Stage::GasEstimated,
            Stage::SignedAndSent,
            Stage::AwaitingReceipt,
            Stage::Confirmed,
        ];
        assert!(path.windows(2).all(|w| w[0].can_transition_to(w[1])));
        assert!(path[4].is_terminal());
        assert!(!path[3].is_terminal());
    }

    #[test]
    fn local_failure_only_before_send() {
        assert!(Stage::NonceAllocated.can_transition_to(Stage::LocalFailure));
        assert!(Stage::GasEstimated.can_transition_to(Stage::LocalFailure));
        assert!(!Stage::SignedAndSent.can_transition_to(Stage::LocalFailure));
        assert!(!Stage::AwaitingReceipt.can_transition_to(Stage::LocalFailure));
    }

    #[test]
    fn terminal_stages_go_nowhere() {
        for stage in [
            Stage::Confirmed,
            Stage::FailedOnChain,
            Stage::UnknownPending,
            Stage::LocalFailure,
        ] {
            assert!(!stage.can_transition_to(Stage::NonceAllocated));
            assert!(!stage.can_transition_to(Stage::Confirmed));
        }
    }

    #[test]
    fn log_records_every_stage() {
        let mut log = StageLog::new(4);
        log.advance(Stage::GasEstimated);
        log.advance(Stage::LocalFailure);
        assert_eq!(log.current(), Stage::LocalFailure);
        assert_eq!(
            log.into_stages(),
            vec![Stage::NonceAllocated, Stage::GasEstimated, Stage::LocalFailure]
        );
    }
}
