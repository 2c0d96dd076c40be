pub use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, Log, TransactionReceipt, H160, H256,
    U256, U64,
};

/// A per-sender transaction sequence number.
pub type Nonce = u64;

/// Receipt status value reported for a transaction that executed successfully.
pub const RECEIPT_STATUS_SUCCESS: u64 = 1;

/// Whether the receipt reports a successful execution.
///
/// Receipts without a status field predate EIP-658 and are treated as successful.
pub fn receipt_succeeded(receipt: &TransactionReceipt) -> bool {
    receipt
        .status
        .map_or(true, |status| status.as_u64() == RECEIPT_STATUS_SUCCESS)
}

/// The block the receipt was included in, if it has been mined.
pub fn receipt_block(receipt: &TransactionReceipt) -> Option<u64> {
    receipt.block_number.map(|b| b.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_without_status_counts_as_success() {
        let receipt = TransactionReceipt::default();
        assert!(receipt_succeeded(&receipt));
    }

    #[test]
    fn receipt_with_zero_status_is_a_failure() {
        let receipt = TransactionReceipt {
            status: Some(U64::zero()),
            ..Default::default()
        };
        assert!(!receipt_succeeded(&receipt));
    }

    #[test]
    fn pending_receipt_has_no_block() {
        let mut receipt = TransactionReceipt::default();
        assert_eq!(receipt_block(&receipt), None);
        receipt.block_number = Some(U64::from(42));
        assert_eq!(receipt_block(&receipt), Some(42));
    }
}
