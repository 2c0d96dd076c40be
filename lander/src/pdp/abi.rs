//! Calldata and event decoding for the three PDPVerifier calls the
//! data-set manager drives.

use ethers::abi::{self, ParamType, Token};
use ethers::utils::{id, keccak256};
use synapse_core::{Address, Bytes, Log, H256, U256};

use crate::pdp::PieceCid;
use crate::{LanderError, LanderResult};

pub const CREATE_DATA_SET: &str = "createDataSet(address,bytes)";
pub const ADD_PIECES: &str = "addPieces(uint256,address,(bytes)[],bytes)";
pub const DELETE_DATA_SET: &str = "deleteDataSet(uint256,bytes)";

pub const DATA_SET_CREATED_EVENT: &str = "DataSetCreated(uint256,address)";
pub const PIECES_ADDED_EVENT: &str = "PiecesAdded(uint256,uint256[],(bytes)[])";

fn calldata(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(abi::encode(args));
    data.into()
}

fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature))
}

pub fn create_data_set(listener: Address, extra_data: &Bytes) -> Bytes {
    calldata(
        CREATE_DATA_SET,
        &[Token::Address(listener), Token::Bytes(extra_data.to_vec())],
    )
}

pub fn add_pieces(
    data_set_id: U256,
    listener: Address,
    pieces: &[PieceCid],
    extra_data: &Bytes,
) -> Bytes {
    let pieces = pieces
        .iter()
        .map(|piece| Token::Tuple(vec![Token::Bytes(piece.as_bytes().to_vec())]))
        .collect();
    calldata(
        ADD_PIECES,
        &[
            Token::Uint(data_set_id),
            Token::Address(listener),
            Token::Array(pieces),
            Token::Bytes(extra_data.to_vec()),
        ],
    )
}

pub fn delete_data_set(data_set_id: U256, extra_data: &Bytes) -> Bytes {
    calldata(
        DELETE_DATA_SET,
        &[Token::Uint(data_set_id), Token::Bytes(extra_data.to_vec())],
    )
}

/// The id of a `DataSetCreated` event emitted by `contract`, if `log` is one.
pub fn data_set_created(contract: Address, log: &Log) -> Option<U256> {
    if log.address != contract || log.topics.first() != Some(&event_topic(DATA_SET_CREATED_EVENT)) {
        return None;
    }
    log.topics
        .get(1)
        .map(|set_id| U256::from_big_endian(set_id.as_bytes()))
}

/// The piece ids of a `PiecesAdded` event emitted by `contract`, if `log` is
/// one.
pub fn pieces_added(contract: Address, log: &Log) -> LanderResult<Option<Vec<u64>>> {
    if log.address != contract || log.topics.first() != Some(&event_topic(PIECES_ADDED_EVENT)) {
        return Ok(None);
    }
    let layout = [
        ParamType::Array(Box::new(ParamType::Uint(256))),
        ParamType::Array(Box::new(ParamType::Tuple(vec![ParamType::Bytes]))),
    ];
    let tokens = abi::decode(&layout, log.data.as_ref()).map_err(|err| LanderError::Decode {
        what: "PiecesAdded event",
        reason: err.to_string(),
    })?;
    let Some(Token::Array(ids)) = tokens.into_iter().next() else {
        return Err(decode_error("missing piece id array"));
    };
    ids.into_iter()
        .map(|token| match token {
            Token::Uint(id) if id <= U256::from(u64::MAX) => Ok(id.as_u64()),
            Token::Uint(id) => Err(decode_error(format!("piece id {id} does not fit in u64"))),
            other => Err(decode_error(format!("unexpected piece id token {other:?}"))),
        })
        .collect::<LanderResult<Vec<_>>>()
        .map(Some)
}

fn decode_error(reason: impl Into<String>) -> LanderError {
    LanderError::Decode {
        what: "PiecesAdded event",
        reason: reason.into(),
    }
}
