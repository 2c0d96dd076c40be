use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use synapse_core::{Address, LedgerProvider, Nonce};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::txutil::cancellable;
use crate::{LanderError, LanderMetrics, LanderResult};

pub use guard::NonceGuard;

mod guard;

#[derive(Debug, Default)]
struct NonceState {
    /// Next never-issued nonce. `None` until the first refresh.
    next_nonce: Option<Nonce>,
    /// Issued and neither confirmed nor reclaimed
    pending: BTreeSet<Nonce>,
    /// Released by local failures, reissued smallest first
    reclaimable: BTreeSet<Nonce>,
}

impl NonceState {
    /// Issue a nonce if the counter is already known.
    fn take(&mut self) -> Option<Nonce> {
        let seed = self.next_nonce?;
        Some(self.issue(seed))
    }

    /// Issue the smallest reclaimable nonce, or the next counter value. An
    /// unset counter starts at `seed`.
    fn issue(&mut self, seed: Nonce) -> Nonce {
        let nonce = match self.reclaimable.pop_first() {
            Some(nonce) => nonce,
            None => {
                let nonce = *self.next_nonce.get_or_insert(seed);
                self.next_nonce = Some(nonce.saturating_add(1));
                nonce
            }
        };
        self.pending.insert(nonce);
        nonce
    }
}

/// Hands out nonces for one sender address.
///
/// Nonces released by failures that happened before broadcast are reused
/// smallest first, so local failures never leave a permanent gap. The state
/// lock is never held across an await; refreshes from the network are
/// serialized by a separate async lock.
pub struct NonceManager {
    address: Address,
    provider: Arc<dyn LedgerProvider>,
    state: Mutex<NonceState>,
    refresh: tokio::sync::Mutex<()>,
    metrics: LanderMetrics,
}

impl NonceManager {
    pub fn new(address: Address, provider: Arc<dyn LedgerProvider>, metrics: LanderMetrics) -> Self {
        Self {
            address,
            provider,
            state: Mutex::new(NonceState::default()),
            refresh: tokio::sync::Mutex::new(()),
            metrics,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Allocate the next nonce, fetching the network's pending count on
    /// first use.
    #[instrument(skip_all, fields(address = ?self.address))]
    pub async fn get_nonce(&self, cancel: &CancellationToken) -> LanderResult<Nonce> {
        if let Some(nonce) = self.try_take() {
            return Ok(nonce);
        }

        let _refresh = cancellable(cancel, self.refresh.lock()).await?;
        // another caller may have refreshed while we waited
        if let Some(nonce) = self.try_take() {
            return Ok(nonce);
        }

        let fetched = self.fetch_pending_nonce(cancel).await?;
        let nonce = {
            let mut state = self.state.lock();
            if state.next_nonce.is_none() {
                info!(nonce = fetched, "Initialized nonce from network");
            }
            state.issue(fetched)
        };
        self.record_allocation(nonce);
        Ok(nonce)
    }

    /// Lease a nonce behind a guard that reclaims it on drop unless the
    /// transaction was sent.
    pub async fn lease(&self, cancel: &CancellationToken) -> LanderResult<NonceGuard<'_>> {
        let nonce = self.get_nonce(cancel).await?;
        Ok(NonceGuard::new(self, nonce))
    }

    /// Retire `nonce` for good. Unknown or already confirmed nonces are
    /// ignored.
    pub fn mark_confirmed(&self, nonce: Nonce) {
        let (removed, pending) = {
            let mut state = self.state.lock();
            (state.pending.remove(&nonce), state.pending.len())
        };
        self.metrics.set_pending_nonces(pending);
        if removed {
            debug!(nonce, pending, "Nonce confirmed");
        } else {
            debug!(nonce, "Confirm for untracked nonce ignored");
        }
    }

    /// Return `nonce` to the reclaim pool. Only valid for a transaction that
    /// never reached the network. Returns false, and changes nothing, if the
    /// nonce is not pending.
    pub fn mark_failed(&self, nonce: Nonce) -> bool {
        let (reclaimed, pending) = {
            let mut state = self.state.lock();
            let reclaimed = state.pending.remove(&nonce);
            if reclaimed {
                state.reclaimable.insert(nonce);
            }
            (reclaimed, state.pending.len())
        };
        if reclaimed {
            self.metrics.set_pending_nonces(pending);
            self.metrics.increment_reclaimed_nonces();
            info!(nonce, "Nonce reclaimed after local failure");
        } else {
            warn!(nonce, "Refusing to reclaim nonce that is not pending");
        }
        reclaimed
    }

    /// Re-synchronise with the network, dropping all pending and reclaimable
    /// nonces.
    #[instrument(skip_all, fields(address = ?self.address))]
    pub async fn reset(&self, cancel: &CancellationToken) -> LanderResult<Nonce> {
        let _refresh = cancellable(cancel, self.refresh.lock()).await?;
        let fetched = self.fetch_pending_nonce(cancel).await?;
        let (dropped_pending, dropped_reclaimable) = {
            let mut state = self.state.lock();
            let dropped = (state.pending.len(), state.reclaimable.len());
            state.pending.clear();
            state.reclaimable.clear();
            state.next_nonce = Some(fetched);
            dropped
        };
        self.metrics.set_pending_nonces(0);
        self.metrics.increment_nonce_resets();
        info!(
            nonce = fetched,
            dropped_pending, dropped_reclaimable, "Nonce state reset from network"
        );
        Ok(fetched)
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn reclaimable_count(&self) -> usize {
        self.state.lock().reclaimable.len()
    }

    fn try_take(&self) -> Option<Nonce> {
        let nonce = self.state.lock().take()?;
        self.record_allocation(nonce);
        Some(nonce)
    }

    fn record_allocation(&self, nonce: Nonce) {
        let pending = self.pending_count();
        self.metrics.set_pending_nonces(pending);
        debug!(nonce, pending, "Allocated nonce");
    }

    async fn fetch_pending_nonce(&self, cancel: &CancellationToken) -> LanderResult<Nonce> {
        cancellable(cancel, self.provider.get_pending_nonce(self.address))
            .await?
            .map_err(LanderError::NonceRefresh)
    }
}

impl Debug for NonceManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NonceManager")
            .field("address", &self.address)
            .field("next_nonce", &state.next_nonce)
            .field("pending", &state.pending.len())
            .field("reclaimable", &state.reclaimable.len())
            .finish()
    }
}
