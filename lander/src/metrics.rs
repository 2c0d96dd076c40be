use prometheus::{
    opts, register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};

const METRICS_NAMESPACE: &str = "synapse_lander";

pub const OUTCOME_SENT: &str = "sent";
pub const OUTCOME_ALREADY_KNOWN: &str = "already_known";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_EXHAUSTED: &str = "retries_exhausted";
pub const OUTCOME_CANCELLED: &str = "cancelled";

fn namespaced(name: &str) -> String {
    format!("{}_{}", METRICS_NAMESPACE, name)
}

/// Metrics for one sender.
#[derive(Clone)]
pub struct LanderMetrics {
    /// Nonces handed out and neither confirmed nor reclaimed
    pending_nonces: IntGauge,
    reclaimed_nonces: IntCounter,
    nonce_resets: IntCounter,
    /// Every raw send, including resends
    submission_attempts: IntCounter,
    /// Final outcome of each submission, by label
    submission_outcomes: IntCounterVec,
    receipt_poll_errors: IntCounter,
}

impl LanderMetrics {
    pub fn new(registry: &Registry) -> eyre::Result<Self> {
        let pending_nonces = register_int_gauge_with_registry!(
            opts!(
                namespaced("pending_nonces"),
                "The number of allocated nonces whose transaction is not yet confirmed",
            ),
            registry.clone()
        )?;
        let reclaimed_nonces = register_int_counter_with_registry!(
            opts!(
                namespaced("reclaimed_nonces"),
                "The number of nonces returned to the reclaim pool after a local failure",
            ),
            registry.clone()
        )?;
        let nonce_resets = register_int_counter_with_registry!(
            opts!(
                namespaced("nonce_resets"),
                "The number of times nonce state was re-synchronised with the network",
            ),
            registry.clone()
        )?;
        let submission_attempts = register_int_counter_with_registry!(
            opts!(
                namespaced("submission_attempts"),
                "The number of raw transaction sends, including retries",
            ),
            registry.clone()
        )?;
        let submission_outcomes = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("submission_outcomes"),
                "The number of submissions by final outcome",
            ),
            &["outcome"],
            registry.clone()
        )?;
        let receipt_poll_errors = register_int_counter_with_registry!(
            opts!(
                namespaced("receipt_poll_errors"),
                "The number of RPC errors seen while polling for receipts",
            ),
            registry.clone()
        )?;

        Ok(Self {
            pending_nonces,
            reclaimed_nonces,
            nonce_resets,
            submission_attempts,
            submission_outcomes,
            receipt_poll_errors,
        })
    }

    pub fn set_pending_nonces(&self, count: usize) {
        self.pending_nonces
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn increment_reclaimed_nonces(&self) {
        self.reclaimed_nonces.inc();
    }

    pub fn increment_nonce_resets(&self) {
        self.nonce_resets.inc();
    }

    pub fn increment_submission_attempts(&self) {
        self.submission_attempts.inc();
    }

    pub fn increment_submission_outcome(&self, outcome: &str) {
        self.submission_outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn increment_receipt_poll_errors(&self) {
        self.receipt_poll_errors.inc();
    }
}

impl std::fmt::Debug for LanderMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanderMetrics")
            .field("pending_nonces", &self.pending_nonces.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl LanderMetrics {
    pub fn dummy_instance() -> Self {
        Self::new(&Registry::new()).unwrap()
    }

    pub fn get_pending_nonces(&self) -> i64 {
        self.pending_nonces.get()
    }

    pub fn get_reclaimed_nonces(&self) -> u64 {
        self.reclaimed_nonces.get()
    }

    pub fn get_nonce_resets(&self) -> u64 {
        self.nonce_resets.get()
    }

    pub fn get_submission_attempts(&self) -> u64 {
        self.submission_attempts.get()
    }

    pub fn get_submission_outcome(&self, outcome: &str) -> u64 {
        self.submission_outcomes.with_label_values(&[outcome]).get()
    }

    pub fn get_receipt_poll_errors(&self) -> u64 {
        self.receipt_poll_errors.get()
    }
}
