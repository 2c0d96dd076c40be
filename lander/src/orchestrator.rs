//! The nonce-safe submission protocol.
//!
//! One call to [`TransactionOrchestrator::execute`] allocates a nonce,
//! estimates gas, signs, sends and waits for the receipt. The nonce is
//! returned to the reclaim pool only when the network never accepted the
//! transaction; once the send call succeeds it is held until the receipt
//! settles it.

use std::sync::Arc;

use ethers::types::Eip1559TransactionRequest;
use synapse_core::{
    Address, Bytes, LedgerProvider, Nonce, TransactionReceipt, TypedTransaction, H256, U256,
};
use synapse_signer::{require_evm, EvmSigner, Signer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn, Span};

use crate::txutil::{
    cancellable, estimate_gas_with_buffer, gas_price_with_multiplier, is_nonce_error,
    tip_cap_with_multiplier, NonceGuard, NonceManager, ReceiptWaiter, SubmissionRetrier,
};
use crate::{LanderError, LanderMetrics, LanderResult, LanderSettings, ResultExt};

pub use stage::Stage;
use stage::StageLog;

mod stage;

/// A contract call to turn into a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    /// Native value attached to the call
    pub value: U256,
}

impl ContractCall {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::zero(),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A transaction that was included and executed successfully.
#[derive(Debug, Clone)]
pub struct Submission {
    pub nonce: Nonce,
    pub tx_hash: H256,
    pub receipt: TransactionReceipt,
    pub stages: Vec<Stage>,
}

/// Composes the nonce manager, retrier and receipt waiter for one sender.
#[derive(Debug)]
pub struct TransactionOrchestrator {
    provider: Arc<dyn LedgerProvider>,
    signer: Arc<dyn Signer>,
    nonces: Arc<NonceManager>,
    retrier: SubmissionRetrier,
    waiter: ReceiptWaiter,
    settings: LanderSettings,
    chain_id: u64,
}

impl TransactionOrchestrator {
    /// Validate the settings, query the chain id and set up a fresh nonce
    /// manager for the signer's EVM address.
    pub async fn new(
        provider: Arc<dyn LedgerProvider>,
        signer: Arc<dyn Signer>,
        settings: LanderSettings,
        metrics: LanderMetrics,
        cancel: &CancellationToken,
    ) -> LanderResult<Self> {
        settings.validate()?;
        let sender = require_evm(signer.as_ref())?.evm_address();
        let chain_id = cancellable(cancel, provider.get_chain_id())
            .await?
            .context("fetch chain id")?;
        let nonces = Arc::new(NonceManager::new(sender, provider.clone(), metrics.clone()));
        Self::from_parts(provider, signer, nonces, settings, metrics, chain_id)
    }

    /// Assemble from existing parts, for callers that share a nonce manager
    /// between several orchestrators of the same sender.
    pub fn from_parts(
        provider: Arc<dyn LedgerProvider>,
        signer: Arc<dyn Signer>,
        nonces: Arc<NonceManager>,
        settings: LanderSettings,
        metrics: LanderMetrics,
        chain_id: u64,
    ) -> LanderResult<Self> {
        settings.validate()?;
        let sender = require_evm(signer.as_ref())?.evm_address();
        if nonces.address() != sender {
            return Err(LanderError::InvalidConfig(format!(
                "nonce manager tracks {:?} but the signer is {:?}",
                nonces.address(),
                sender
            )));
        }
        let retrier = SubmissionRetrier::new(provider.clone(), settings.submission, metrics.clone());
        let waiter = ReceiptWaiter::new(
            provider.clone(),
            settings.receipt,
            settings.confirmations,
            metrics,
        );
        Ok(Self {
            provider,
            signer,
            nonces,
            retrier,
            waiter,
            settings,
            chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn sender(&self) -> Address {
        self.nonces.address()
    }

    pub fn nonces(&self) -> &Arc<NonceManager> {
        &self.nonces
    }

    pub fn provider(&self) -> &Arc<dyn LedgerProvider> {
        &self.provider
    }

    pub fn settings(&self) -> &LanderSettings {
        &self.settings
    }

    /// Submit `call` and wait for it to be confirmed.
    ///
    /// Errors before the send call succeeds reclaim the nonce, except nonce
    /// errors from the node, which trigger a reset instead. Errors while
    /// waiting come back as [`LanderError::UnknownPending`] and leave the
    /// nonce pending. A receipt with a failure status retires the nonce and
    /// comes back as [`LanderError::FailedOnChain`].
    ///
    /// The reset after a nonce error is manager-wide: it also drops the
    /// leases of submissions still building or signing on the same
    /// [`NonceManager`]. Their guards no longer reclaim on drop, and the
    /// next allocation starts again from the network's pending count, so a
    /// transaction already signed with one of those nonces can collide with
    /// a fresh one and be rejected by the node.
    #[instrument(skip_all, fields(to = ?call.to, nonce = tracing::field::Empty, tx_hash = tracing::field::Empty))]
    pub async fn execute(
        &self,
        call: ContractCall,
        cancel: &CancellationToken,
    ) -> LanderResult<Submission> {
        let evm: &dyn EvmSigner = require_evm(self.signer.as_ref())?;
        let mut guard = self.nonces.lease(cancel).await.context("allocate nonce")?;
        let nonce = guard.nonce();
        Span::current().record("nonce", nonce);
        let mut stages = StageLog::new(nonce);

        let tx = match self.build_transaction(&call, nonce, cancel).await {
            Ok(tx) => tx,
            Err(err) => return Err(local_failure(&mut stages, err.with_context("build transaction"))),
        };
        stages.advance(Stage::GasEstimated);

        let raw = match evm.sign_transaction(&tx, self.chain_id).context("sign transaction") {
            Ok(raw) => raw,
            Err(err) => return Err(local_failure(&mut stages, err)),
        };

        let tx_hash = match self.retrier.send(raw, cancel).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => return Err(self.send_failed(guard, &mut stages, err, cancel).await),
        };
        guard.mark_sent();
        Span::current().record("tx_hash", tracing::field::debug(&tx_hash));
        stages.advance(Stage::SignedAndSent);

        stages.advance(Stage::AwaitingReceipt);
        match self.waiter.wait(tx_hash, cancel).await {
            Ok(receipt) => {
                guard.confirm();
                stages.advance(Stage::Confirmed);
                info!(nonce, ?tx_hash, "Transaction confirmed");
                Ok(Submission {
                    nonce,
                    tx_hash,
                    receipt,
                    stages: stages.into_stages(),
                })
            }
            Err(err @ LanderError::FailedOnChain { .. }) => {
                guard.confirm();
                stages.advance(Stage::FailedOnChain);
                Err(err.with_context("wait for receipt"))
            }
            Err(err) => {
                // the transaction may still land, so the nonce stays pending
                debug_assert!(guard.is_sent());
                drop(guard);
                stages.advance(Stage::UnknownPending);
                error!(nonce, ?tx_hash, error = %err, "Transaction state unknown, nonce left pending");
                Err(LanderError::UnknownPending {
                    tx_hash,
                    nonce,
                    source: Box::new(err),
                })
            }
        }
    }

    /// EIP-1559 transaction for `call` with buffered gas and suggested fees.
    async fn build_transaction(
        &self,
        call: &ContractCall,
        nonce: Nonce,
        cancel: &CancellationToken,
    ) -> LanderResult<TypedTransaction> {
        let mut request = Eip1559TransactionRequest::new()
            .from(self.sender())
            .to(call.to)
            .data(call.data.clone())
            .value(call.value)
            .nonce(nonce)
            .chain_id(self.chain_id);

        let provider = self.provider.as_ref();
        let multiplier = self.settings.gas_price_multiplier;
        let gas = estimate_gas_with_buffer(
            provider,
            &request.clone().into(),
            self.settings.gas_buffer_percent,
            cancel,
        )
        .await?;
        let fee_cap = gas_price_with_multiplier(provider, multiplier, cancel).await?;
        let tip_cap = tip_cap_with_multiplier(provider, multiplier, cancel).await?;

        request = request
            .gas(gas)
            .max_priority_fee_per_gas(tip_cap)
            .max_fee_per_gas(fee_cap.max(tip_cap));
        Ok(request.into())
    }

    /// Settle the nonce after the retrier gave up.
    async fn send_failed(
        &self,
        guard: NonceGuard<'_>,
        stages: &mut StageLog,
        err: LanderError,
        cancel: &CancellationToken,
    ) -> LanderError {
        let nonce = guard.nonce();
        stages.advance(Stage::LocalFailure);
        if is_nonce_error(&err) {
            guard.disarm();
            warn!(nonce, error = %err, "Node rejected the nonce, resetting nonce manager");
            if let Err(reset_err) = self.nonces.reset(cancel).await {
                error!(nonce, error = %reset_err, "Nonce reset after nonce error failed");
            }
        } else {
            // dropping the armed guard reclaims the nonce
            drop(guard);
            warn!(nonce, error = %err, "Transaction was not accepted, nonce reclaimed");
        }
        err.with_context("send transaction")
    }
}

fn local_failure(stages: &mut StageLog, err: LanderError) -> LanderError {
    stages.advance(Stage::LocalFailure);
    warn!(error = %err, "Submission failed before sending");
    err
}
