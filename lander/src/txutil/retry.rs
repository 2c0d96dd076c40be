use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{FailureKind, LanderError, LanderResult, RetryConfig};

/// Deadline `timeout` from now, clamped for absurdly large timeouts.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> LanderResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LanderError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}

/// Drive `fut` to completion unless `cancel` fires first.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> LanderResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LanderError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Run `op` up to `config.max_retries + 1` times, sleeping the jittered
/// backoff between attempts. `op` receives the zero based attempt number.
/// Returns the last error once the budget is spent. Cancellation, either
/// observed here or returned by `op`, ends the loop immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut op: F,
) -> LanderResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = LanderResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(LanderError::Cancelled);
        }
        let err = match cancellable(cancel, op(attempt)).await? {
            Ok(value) => return Ok(value),
            Err(err) if err.kind() == FailureKind::Cancelled => return Err(err),
            Err(err) => err,
        };
        if attempt >= config.max_retries {
            warn!(attempts = attempt + 1, error = %err, "Giving up after max retries");
            return Err(err);
        }
        let delay = config.backoff_for(attempt);
        debug!(attempt, ?delay, error = %err, "Operation failed, retrying");
        sleep_or_cancel(delay, cancel).await?;
        attempt += 1;
    }
}

/// Evaluate `check` now and then every `every` until it yields `true`.
/// Fails with [`LanderError::PollTimeout`] once `timeout` has elapsed, and
/// passes through any error from `check`.
pub async fn poll_until<F, Fut>(
    every: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
    mut check: F,
) -> LanderResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LanderResult<bool>>,
{
    if every.is_zero() {
        return Err(LanderError::InvalidConfig(
            "poll interval must be > 0".to_owned(),
        ));
    }
    let deadline = deadline_after(timeout);
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LanderError::Cancelled),
            _ = sleep_until(deadline) => return Err(LanderError::PollTimeout { timeout }),
            _ = ticker.tick() => {}
        }
        let done = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LanderError::Cancelled),
            _ = sleep_until(deadline) => return Err(LanderError::PollTimeout { timeout }),
            done = check() => done?,
        };
        if done {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use synapse_core::ChainCommunicationError;

    use super::*;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }

    fn flaky() -> LanderError {
        ChainCommunicationError::msg("connection reset").into()
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let out = retry_with_backoff(&fast_config(5), &cancel, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(flaky())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_after_budget() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let err = retry_with_backoff::<(), _, _>(&fast_config(2), &cancel, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(LanderError::InvalidInput(format!("attempt {attempt}"))) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.to_string(), "attempt 2");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let config = RetryConfig {
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
            ..fast_config(5)
        };
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let err = retry_with_backoff::<(), _, _>(&config, &cancel, |_| async { Err(flaky()) })
            .await
            .unwrap_err();
        assert!(matches!(err, LanderError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_never_calls_op() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff::<(), _, _>(&fast_config(3), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LanderError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_checks_immediately_then_on_interval() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let started = Instant::now();
        poll_until(Duration::from_secs(1), Duration::from_secs(10), &cancel, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n == 2) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out() {
        let cancel = CancellationToken::new();
        let err = poll_until(Duration::from_secs(1), Duration::from_millis(3500), &cancel, || async {
            Ok(false)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LanderError::PollTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_passes_check_errors_through() {
        let cancel = CancellationToken::new();
        let err = poll_until(Duration::from_secs(1), Duration::from_secs(5), &cancel, || async {
            Err(LanderError::InvalidInput("bad".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "bad");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_rejects_zero_interval() {
        let cancel = CancellationToken::new();
        let err = poll_until(Duration::ZERO, Duration::from_secs(5), &cancel, || async { Ok(true) })
            .await
            .unwrap_err();
        assert!(matches!(err, LanderError::InvalidConfig(_)));
    }
}
