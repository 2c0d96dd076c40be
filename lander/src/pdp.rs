//! Data-set management against the PDPVerifier contract.
//!
//! Every operation here consumes a nonce and runs through
//! [`TransactionOrchestrator::execute`], so the nonce rules of the
//! orchestrator apply unchanged.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use synapse_core::{Address, Bytes, LedgerProvider, Network, TransactionReceipt, H256, U256};
use synapse_signer::Signer;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::orchestrator::{ContractCall, Submission, TransactionOrchestrator};
use crate::{LanderError, LanderMetrics, LanderResult, LanderSettings, ResultExt};

pub mod abi;

/// Raw bytes of a piece CID, as the verifier stores them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieceCid(Bytes);

impl PieceCid {
    pub fn new(bytes: impl Into<Bytes>) -> LanderResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(LanderError::InvalidInput("piece CID must not be empty".into()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Display for PieceCid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of [`DataSetManager::create_data_set`].
#[derive(Debug, Clone)]
pub struct DataSetCreated {
    pub data_set_id: U256,
    pub tx_hash: H256,
    pub receipt: TransactionReceipt,
}

/// Outcome of [`DataSetManager::add_pieces`].
#[derive(Debug, Clone)]
pub struct PiecesAdded {
    pub tx_hash: H256,
    pub receipt: TransactionReceipt,
    /// Number of pieces submitted
    pub pieces_added: usize,
    /// Ids the verifier assigned, in submission order
    pub piece_ids: Vec<u64>,
}

#[derive(Debug)]
pub struct DataSetManager {
    orchestrator: TransactionOrchestrator,
    network: Network,
    contract: Address,
}

impl DataSetManager {
    /// Connect to `network`. Fails if the provider serves a different chain
    /// or the signer cannot sign EVM transactions.
    pub async fn new(
        provider: Arc<dyn LedgerProvider>,
        signer: Arc<dyn Signer>,
        network: Network,
        settings: LanderSettings,
        metrics: LanderMetrics,
        cancel: &CancellationToken,
    ) -> LanderResult<Self> {
        let orchestrator =
            TransactionOrchestrator::new(provider, signer, settings, metrics, cancel).await?;
        Self::from_orchestrator(orchestrator, network)
    }

    pub fn from_orchestrator(
        orchestrator: TransactionOrchestrator,
        network: Network,
    ) -> LanderResult<Self> {
        if orchestrator.chain_id() != network.chain_id() {
            return Err(LanderError::ChainIdMismatch {
                network: network.to_string(),
                expected: network.chain_id(),
                actual: orchestrator.chain_id(),
            });
        }
        let contract = orchestrator
            .settings()
            .contract_address
            .unwrap_or_else(|| network.pdp_verifier_address());
        Ok(Self {
            orchestrator,
            network,
            contract,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The verifier contract calls are sent to
    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn orchestrator(&self) -> &TransactionOrchestrator {
        &self.orchestrator
    }

    /// Create a data set and return the id the verifier assigned.
    #[instrument(skip_all, fields(?listener, %value))]
    pub async fn create_data_set(
        &self,
        listener: Address,
        extra_data: impl Into<Bytes>,
        value: U256,
        cancel: &CancellationToken,
    ) -> LanderResult<DataSetCreated> {
        let extra_data = extra_data.into();
        let call = ContractCall::new(self.contract, abi::create_data_set(listener, &extra_data))
            .with_value(value);
        let Submission {
            tx_hash, receipt, ..
        } = self
            .orchestrator
            .execute(call, cancel)
            .await
            .context("create data set")?;

        let data_set_id = receipt
            .logs
            .iter()
            .find_map(|log| abi::data_set_created(self.contract, log))
            .ok_or_else(|| missing_event("DataSetCreated event"))
            .context("create data set")?;
        info!(%data_set_id, ?tx_hash, "Data set created");
        Ok(DataSetCreated {
            data_set_id,
            tx_hash,
            receipt,
        })
    }

    /// Add `pieces` to a data set and return the ids they were given.
    ///
    /// `listener` is not looked up on chain: the caller must pass the
    /// listener the data set was created with, and it is encoded into the
    /// call as given.
    #[instrument(skip_all, fields(%data_set_id, ?listener, pieces = pieces.len()))]
    pub async fn add_pieces(
        &self,
        data_set_id: U256,
        listener: Address,
        pieces: &[PieceCid],
        extra_data: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> LanderResult<PiecesAdded> {
        if pieces.is_empty() {
            return Err(LanderError::InvalidInput("no pieces provided".into()));
        }
        let extra_data = extra_data.into();
        let call = ContractCall::new(
            self.contract,
            abi::add_pieces(data_set_id, listener, pieces, &extra_data),
        );
        let Submission {
            tx_hash, receipt, ..
        } = self
            .orchestrator
            .execute(call, cancel)
            .await
            .context("add pieces")?;

        let mut piece_ids = None;
        for log in &receipt.logs {
            if let Some(ids) = abi::pieces_added(self.contract, log).context("add pieces")? {
                piece_ids = Some(ids);
                break;
            }
        }
        let piece_ids = piece_ids
            .ok_or_else(|| missing_event("PiecesAdded event"))
            .context("add pieces")?;
        info!(?tx_hash, ?piece_ids, "Pieces added");
        Ok(PiecesAdded {
            tx_hash,
            receipt,
            pieces_added: pieces.len(),
            piece_ids,
        })
    }

    #[instrument(skip_all, fields(%data_set_id))]
    pub async fn delete_data_set(
        &self,
        data_set_id: U256,
        extra_data: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> LanderResult<Submission> {
        let call = ContractCall::new(
            self.contract,
            abi::delete_data_set(data_set_id, &extra_data.into()),
        );
        let submission = self
            .orchestrator
            .execute(call, cancel)
            .await
            .context("delete data set")?;
        info!(tx_hash = ?submission.tx_hash, "Data set deleted");
        Ok(submission)
    }
}

fn missing_event(what: &'static str) -> LanderError {
    LanderError::Decode {
        what,
        reason: "event not found in receipt".into(),
    }
}
