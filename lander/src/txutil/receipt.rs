use std::future::Future;
use std::sync::Arc;

use derive_new::new;
use synapse_core::{
    receipt_block, receipt_succeeded, ChainCommunicationError, LedgerProvider, TransactionReceipt,
    H256,
};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::txutil::retry::deadline_after;
use crate::{LanderError, LanderMetrics, LanderResult, ReceiptWaitConfig};

/// Polls for a receipt until it is confirmed, fails on chain, the wait
/// times out or the RPC looks unavailable.
///
/// "Not found" is the normal answer before a transaction is mined and resets
/// the consecutive-error count; only real RPC errors count towards
/// `max_consecutive_errors`.
#[derive(new, Debug, Clone)]
pub struct ReceiptWaiter {
    provider: Arc<dyn LedgerProvider>,
    config: ReceiptWaitConfig,
    /// Blocks required on top of the inclusion block
    confirmations: u64,
    metrics: LanderMetrics,
}

/// Counts consecutive RPC failures and decides when to give up.
struct ErrorBudget {
    max: u32,
    consecutive: u32,
}

impl ErrorBudget {
    fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Record a failure. Returns the count once the budget is spent.
    fn exhausted_by(&mut self) -> Option<u32> {
        self.consecutive = self.consecutive.saturating_add(1);
        (self.consecutive >= self.max).then_some(self.consecutive)
    }
}

impl ReceiptWaiter {
    #[instrument(skip_all, fields(?tx_hash, confirmations = self.confirmations))]
    pub async fn wait(
        &self,
        tx_hash: H256,
        cancel: &CancellationToken,
    ) -> LanderResult<TransactionReceipt> {
        self.config.validate()?;
        let deadline = deadline_after(self.config.timeout);
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut errors = ErrorBudget {
            max: self.config.max_consecutive_errors,
            consecutive: 0,
        };
        let mut polls = 0u32;

        loop {
            self.bounded(tx_hash, polls, deadline, cancel, ticker.tick())
                .await?;
            polls = polls.saturating_add(1);

            let fetched = self
                .bounded(
                    tx_hash,
                    polls,
                    deadline,
                    cancel,
                    self.provider.get_transaction_receipt(tx_hash),
                )
                .await?;
            let receipt = match fetched {
                Ok(Some(receipt)) => receipt,
                Ok(None) => {
                    trace!(polls, "Receipt not found yet");
                    errors.reset();
                    continue;
                }
                Err(err) => {
                    self.record_error(tx_hash, &mut errors, err, "receipt")?;
                    continue;
                }
            };
            let Some(block) = receipt_block(&receipt) else {
                trace!(polls, "Receipt has no block yet");
                errors.reset();
                continue;
            };
            errors.reset();

            if !receipt_succeeded(&receipt) {
                let status = receipt.status.map(|s| s.as_u64()).unwrap_or_default();
                error!(block, status, "Transaction failed on chain");
                return Err(LanderError::FailedOnChain {
                    tx_hash,
                    status,
                    receipt: Box::new(receipt),
                });
            }
            if self.confirmations == 0 {
                info!(block, polls, "Transaction confirmed");
                return Ok(receipt);
            }

            let head = self
                .bounded(tx_hash, polls, deadline, cancel, self.provider.get_block_number())
                .await?;
            let head = match head {
                Ok(head) => head,
                Err(err) => {
                    self.record_error(tx_hash, &mut errors, err, "block number")?;
                    continue;
                }
            };
            if block.saturating_add(self.confirmations) <= head {
                info!(block, head, polls, "Transaction confirmed");
                return Ok(receipt);
            }
            debug!(block, head, "Waiting for confirmations");
        }
    }

    /// Race `fut` against cancellation and the overall deadline.
    async fn bounded<T>(
        &self,
        tx_hash: H256,
        polls: u32,
        deadline: Instant,
        cancel: &CancellationToken,
        fut: impl Future<Output = T>,
    ) -> LanderResult<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LanderError::Cancelled),
            _ = sleep_until(deadline) => Err(self.timed_out(tx_hash, polls)),
            out = fut => Ok(out),
        }
    }

    fn record_error(
        &self,
        tx_hash: H256,
        errors: &mut ErrorBudget,
        err: ChainCommunicationError,
        what: &str,
    ) -> LanderResult<()> {
        self.metrics.increment_receipt_poll_errors();
        match errors.exhausted_by() {
            Some(count) => {
                error!(error = %err, errors = count, what, "Giving up on receipt after repeated RPC errors");
                Err(LanderError::ReceiptRpcFailure {
                    tx_hash,
                    errors: count,
                    source: err,
                })
            }
            None => {
                warn!(error = %err, errors = errors.consecutive, what, "RPC error while polling");
                Ok(())
            }
        }
    }

    fn timed_out(&self, tx_hash: H256, polls: u32) -> LanderError {
        warn!(polls, timeout = ?self.config.timeout, "Timed out waiting for receipt");
        LanderError::ReceiptTimeout { tx_hash, polls }
    }
}

#[cfg(test)]
mod tests;
