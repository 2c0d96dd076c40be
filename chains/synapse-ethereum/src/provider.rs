use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, MiddlewareError, Provider};
use ethers::types::BlockNumber;
use tracing::{instrument, trace};
use url::Url;

use synapse_core::{
    Address, Bytes, ChainCommunicationError, ChainResult, LedgerProvider, TransactionReceipt,
    TypedTransaction, H256, U256,
};

/// Adapts any ethers [`Middleware`] to [`LedgerProvider`].
#[derive(Debug, Clone)]
pub struct EthersLedgerProvider<M> {
    inner: Arc<M>,
}

impl<M> EthersLedgerProvider<M> {
    /// Wrap an existing middleware stack
    pub fn new(inner: Arc<M>) -> Self {
        Self { inner }
    }

    /// The wrapped middleware
    pub fn inner(&self) -> &Arc<M> {
        &self.inner
    }
}

impl EthersLedgerProvider<Provider<Http>> {
    /// Plain HTTP JSON-RPC provider for `url`
    pub fn from_url(url: Url) -> Self {
        Self::new(Arc::new(Provider::new(Http::new(url))))
    }
}

/// Keep JSON-RPC error objects structured so their code and message survive;
/// everything else is wrapped as-is.
fn to_chain_error<E: MiddlewareError + 'static>(err: E) -> ChainCommunicationError {
    if let Some(resp) = err.as_error_response() {
        return ChainCommunicationError::JsonRpcError {
            code: resp.code,
            message: resp.message.clone(),
        };
    }
    ChainCommunicationError::from_other(err)
}

/// Node answers that must fit in a u64
fn narrow(value: U256, what: &str) -> ChainResult<u64> {
    u64::try_from(value)
        .map_err(|_| ChainCommunicationError::msg(format!("{what} out of range: {value}")))
}

#[async_trait]
impl<M> LedgerProvider for EthersLedgerProvider<M>
where
    M: Middleware + Debug + 'static,
{
    #[instrument(skip(self), level = "trace")]
    async fn get_pending_nonce(&self, address: Address) -> ChainResult<u64> {
        let count = self
            .inner
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(to_chain_error)?;
        trace!(%count, "pending transaction count");
        narrow(count, "pending nonce")
    }

    async fn get_chain_id(&self) -> ChainResult<u64> {
        let id = self.inner.get_chainid().await.map_err(to_chain_error)?;
        narrow(id, "chain id")
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> ChainResult<U256> {
        self.inner
            .estimate_gas(tx, None)
            .await
            .map_err(to_chain_error)
    }

    async fn suggest_gas_price(&self) -> ChainResult<U256> {
        self.inner.get_gas_price().await.map_err(to_chain_error)
    }

    async fn suggest_tip_cap(&self) -> ChainResult<U256> {
        self.inner
            .provider()
            .request::<_, U256>("eth_maxPriorityFeePerGas", ())
            .await
            .map_err(to_chain_error)
    }

    #[instrument(skip(self, raw), fields(len = raw.len()))]
    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<H256> {
        let pending = self
            .inner
            .send_raw_transaction(raw)
            .await
            .map_err(to_chain_error)?;
        Ok(pending.tx_hash())
    }

    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>> {
        self.inner
            .get_transaction_receipt(hash)
            .await
            .map_err(to_chain_error)
    }

    async fn get_block_number(&self) -> ChainResult<u64> {
        let head = self.inner.get_block_number().await.map_err(to_chain_error)?;
        Ok(head.as_u64())
    }
}
