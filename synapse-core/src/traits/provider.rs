use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::{Address, Bytes, ChainResult, TransactionReceipt, TypedTransaction, H256, U256};

/// The subset of ledger JSON-RPC the transaction layer consumes.
///
/// Implementations must not retry internally; retry policy belongs to the
/// caller so that failures can be classified once.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait LedgerProvider: Send + Sync + Debug {
    /// Number of transactions sent from `address`, including the ones still
    /// waiting in the mempool (`eth_getTransactionCount(address, "pending")`).
    async fn get_pending_nonce(&self, address: Address) -> ChainResult<u64>;

    /// The chain id the node serves
    async fn get_chain_id(&self) -> ChainResult<u64>;

    /// Dry-run the transaction and return the gas it would consume
    async fn estimate_gas(&self, tx: &TypedTransaction) -> ChainResult<U256>;

    /// Suggested legacy gas price (or EIP-1559 fee cap)
    async fn suggest_gas_price(&self) -> ChainResult<U256>;

    /// Suggested EIP-1559 priority fee
    async fn suggest_tip_cap(&self) -> ChainResult<U256>;

    /// Broadcast a signed, RLP-encoded transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<H256>;

    /// Get the receipt of a transaction. `Ok(None)` is the "not found yet"
    /// signal and must not be reported as an error.
    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>>;

    /// Height of the current chain head
    async fn get_block_number(&self) -> ChainResult<u64>;
}
