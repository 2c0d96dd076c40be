use std::sync::Arc;

use derive_new::new;
use ethers::utils::keccak256;
use synapse_core::{Bytes, LedgerProvider, H256};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::metrics::{
    OUTCOME_ALREADY_KNOWN, OUTCOME_CANCELLED, OUTCOME_EXHAUSTED, OUTCOME_REJECTED, OUTCOME_SENT,
};
use crate::txutil::{is_already_known, is_retryable_error, sleep_or_cancel, ErrorCause};
use crate::{LanderError, LanderMetrics, LanderResult, RetryConfig};

/// Broadcasts one signed payload, resending it unchanged on transient
/// failures.
#[derive(new, Debug, Clone)]
pub struct SubmissionRetrier {
    provider: Arc<dyn LedgerProvider>,
    config: RetryConfig,
    metrics: LanderMetrics,
}

impl SubmissionRetrier {
    /// Send `raw` up to `max_retries + 1` times and return its hash.
    ///
    /// A node answering "already known" holds this exact payload, so that
    /// counts as accepted. Cancellation is honoured before each attempt and
    /// during backoff, but an in-flight send is never abandoned.
    #[instrument(skip_all, fields(tx_hash = tracing::field::Empty, max_retries = self.config.max_retries))]
    pub async fn send(&self, raw: Bytes, cancel: &CancellationToken) -> LanderResult<H256> {
        let tx_hash = H256::from(keccak256(&raw));
        tracing::Span::current().record("tx_hash", tracing::field::debug(&tx_hash));

        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let delay = self.config.backoff_for(attempt - 1);
                info!(attempt, ?delay, "Backing off before resending transaction");
                if let Err(err) = sleep_or_cancel(delay, cancel).await {
                    self.metrics.increment_submission_outcome(OUTCOME_CANCELLED);
                    return Err(err);
                }
            }
            if cancel.is_cancelled() {
                self.metrics.increment_submission_outcome(OUTCOME_CANCELLED);
                return Err(LanderError::Cancelled);
            }

            self.metrics.increment_submission_attempts();
            let err = match self.provider.send_raw_transaction(raw.clone()).await {
                Ok(reported) => {
                    if reported != tx_hash {
                        warn!(?reported, "Node reported a different transaction hash");
                    }
                    info!(attempt, "Transaction sent");
                    self.metrics.increment_submission_outcome(OUTCOME_SENT);
                    return Ok(tx_hash);
                }
                Err(err) => err,
            };

            if is_already_known(&err) {
                info!(attempt, "Node already knows the transaction, treating as sent");
                self.metrics
                    .increment_submission_outcome(OUTCOME_ALREADY_KNOWN);
                return Ok(tx_hash);
            }
            if !is_retryable_error(&err) {
                warn!(attempt, error = %err, cause = ErrorCause::of(&err).as_str(), "Transaction rejected");
                self.metrics.increment_submission_outcome(OUTCOME_REJECTED);
                return Err(LanderError::NonRetryable(err));
            }
            if attempt >= self.config.max_retries {
                warn!(attempts = attempt + 1, error = %err, "Transaction send retries exhausted");
                self.metrics.increment_submission_outcome(OUTCOME_EXHAUSTED);
                return Err(LanderError::MaxRetriesExceeded {
                    attempts: attempt + 1,
                    source: err,
                });
            }
            warn!(attempt, error = %err, cause = ErrorCause::of(&err).as_str(), "Transient send failure");
            attempt += 1;
        }
    }
}
