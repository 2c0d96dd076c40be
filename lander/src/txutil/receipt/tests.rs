use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use synapse_core::{ChainCommunicationError, ChainResult, TransactionReceipt, H256};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use super::ReceiptWaiter;
use crate::tests::{receipt, MockLedgerProvider};
use crate::{FailureKind, LanderError, LanderMetrics, ReceiptWaitConfig};

const TX: H256 = H256::repeat_byte(0xaa);

type ReceiptAnswer = ChainResult<Option<TransactionReceipt>>;

fn config(max_consecutive_errors: u32) -> ReceiptWaitConfig {
    ReceiptWaitConfig {
        timeout: Duration::from_secs(60),
        poll_interval: Duration::from_secs(1),
        max_consecutive_errors,
    }
}

fn rpc_error() -> ReceiptAnswer {
    Err(ChainCommunicationError::msg("502 bad gateway"))
}

fn not_found() -> ReceiptAnswer {
    Ok(None)
}

fn mined(block: u64) -> ReceiptAnswer {
    Ok(Some(receipt(TX, block, 1)))
}

/// Answer receipt queries from `answers` in order, then "not found" forever.
fn scripted_receipts(provider: &mut MockLedgerProvider, answers: Vec<ReceiptAnswer>) {
    let queue = Mutex::new(VecDeque::from(answers));
    provider
        .expect_get_transaction_receipt()
        .returning(move |_| queue.lock().pop_front().unwrap_or(Ok(None)));
}

fn scripted_heads(provider: &mut MockLedgerProvider, heads: Vec<ChainResult<u64>>) {
    let queue = Mutex::new(VecDeque::from(heads));
    provider
        .expect_get_block_number()
        .returning(move || queue.lock().pop_front().unwrap_or(Ok(0)));
}

fn waiter(
    provider: MockLedgerProvider,
    config: ReceiptWaitConfig,
    confirmations: u64,
) -> (ReceiptWaiter, LanderMetrics) {
    let metrics = LanderMetrics::dummy_instance();
    (
        ReceiptWaiter::new(Arc::new(provider), config, confirmations, metrics.clone()),
        metrics,
    )
}

#[tokio::test(start_paused = true)]
async fn returns_receipt_once_mined() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, vec![not_found(), not_found(), mined(42)]);
    let (waiter, _) = waiter(provider, config(5), 0);

    let started = Instant::now();
    let receipt = waiter.wait(TX, &CancellationToken::new()).await.unwrap();
    assert_eq!(receipt.block_number, Some(42u64.into()));
    // first poll is immediate, then one per interval
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn consecutive_rpc_errors_mean_rpc_unavailable() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, (0..5).map(|_| rpc_error()).collect());
    let (waiter, metrics) = waiter(provider, config(5), 0);

    let err = waiter.wait(TX, &CancellationToken::new()).await.unwrap_err();
    match &err {
        LanderError::ReceiptRpcFailure { errors, source, .. } => {
            assert_eq!(*errors, 5);
            assert_eq!(source.to_string(), "502 bad gateway");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.kind(), FailureKind::Ambiguous);
    assert!(err.nonce_may_be_live());
    assert_eq!(metrics.get_receipt_poll_errors(), 5);
    assert!(logs_contain("Giving up on receipt after repeated RPC errors"));
}

#[tokio::test(start_paused = true)]
async fn not_found_resets_the_error_count() {
    let mut answers = Vec::new();
    for _ in 0..3 {
        answers.extend((0..4).map(|_| rpc_error()));
        answers.push(not_found());
    }
    answers.push(mined(9));
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, answers);
    let (waiter, metrics) = waiter(provider, config(5), 0);

    let receipt = waiter.wait(TX, &CancellationToken::new()).await.unwrap();
    assert_eq!(receipt.block_number, Some(9u64.into()));
    assert_eq!(metrics.get_receipt_poll_errors(), 12);
}

#[tokio::test(start_paused = true)]
async fn failed_status_returns_the_receipt_with_the_error() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, vec![Ok(Some(receipt(TX, 8, 0)))]);
    let (waiter, _) = waiter(provider, config(5), 0);

    let err = waiter.wait(TX, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::OnChain);
    assert_eq!(err.receipt().map(|r| r.transaction_hash), Some(TX));
    assert!(err.to_string().contains("failed with status 0"));
}

#[tokio::test(start_paused = true)]
async fn times_out_reporting_poll_count() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, vec![]);
    let config = ReceiptWaitConfig {
        timeout: Duration::from_secs(5),
        ..config(5)
    };
    let (waiter, _) = waiter(provider, config, 0);

    let err = waiter.wait(TX, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, LanderError::ReceiptTimeout { polls: 5, .. }));
    assert_eq!(
        err.to_string(),
        "timeout waiting for transaction receipt after 5 polls"
    );
}

#[tokio::test(start_paused = true)]
async fn waits_for_confirmation_depth() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, (0..3).map(|_| mined(100)).collect());
    scripted_heads(&mut provider, vec![Ok(101), Ok(102), Ok(103)]);
    let (waiter, _) = waiter(provider, config(5), 3);

    let started = Instant::now();
    let receipt = waiter.wait(TX, &CancellationToken::new()).await.unwrap();
    assert_eq!(receipt.block_number, Some(100u64.into()));
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn head_errors_are_counted_but_a_found_receipt_resets_them() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, (0..3).map(|_| mined(100)).collect());
    scripted_heads(
        &mut provider,
        vec![
            Err(ChainCommunicationError::msg("connection reset")),
            Err(ChainCommunicationError::msg("connection reset")),
            Ok(102),
        ],
    );
    let (waiter, metrics) = waiter(provider, config(2), 2);

    let receipt = waiter.wait(TX, &CancellationToken::new()).await.unwrap();
    assert_eq!(receipt.block_number, Some(100u64.into()));
    assert_eq!(metrics.get_receipt_poll_errors(), 2);
}

#[tokio::test(start_paused = true)]
async fn head_errors_alone_exhaust_the_budget() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, vec![mined(100)]);
    scripted_heads(
        &mut provider,
        vec![Err(ChainCommunicationError::msg("connection reset"))],
    );
    let (waiter, _) = waiter(provider, config(1), 2);

    let err = waiter.wait(TX, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, LanderError::ReceiptRpcFailure { errors: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_polling() {
    let mut provider = MockLedgerProvider::new();
    scripted_receipts(&mut provider, vec![]);
    let (waiter, _) = waiter(provider, config(5), 0);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = waiter.wait(TX, &cancel).await.unwrap_err();
    assert!(matches!(err, LanderError::Cancelled));
    assert_eq!(started.elapsed(), Duration::from_millis(2_500));
}

#[tokio::test]
async fn out_of_range_config_fails_before_polling() {
    // no expectations: any RPC call would fail the test
    let provider = MockLedgerProvider::new();
    let config = ReceiptWaitConfig {
        poll_interval: Duration::ZERO,
        ..config(5)
    };
    let (waiter, _) = waiter(provider, config, 0);

    let err = waiter.wait(TX, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidConfig);
    assert!(err.to_string().contains("receipt.poll_interval must be > 0"));
}
