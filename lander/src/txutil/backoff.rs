use std::time::Duration;

use rand::{rngs::OsRng, RngCore};
use tracing::warn;

use crate::RetryConfig;

/// Backoff for retry number `attempt` (zero based), with decorrelated
/// jitter drawn from the OS CSPRNG.
///
/// The un-jittered base is `min(initial * multiplier^attempt, max)`; the
/// result lies in `[base / 2, base]`.
pub fn calculate_backoff(attempt: u32, initial: Duration, max: Duration, multiplier: f64) -> Duration {
    calculate_backoff_with_rng(attempt, initial, max, multiplier, &mut OsRng)
}

/// [`calculate_backoff`] with a caller supplied entropy source. If the
/// source fails the jitter term is zero and the result is exactly
/// `base / 2`.
pub fn calculate_backoff_with_rng<R: RngCore + ?Sized>(
    attempt: u32,
    initial: Duration,
    max: Duration,
    multiplier: f64,
    rng: &mut R,
) -> Duration {
    let half = base_backoff(attempt, initial, max, multiplier) / 2;

    let mut buf = [0u8; 8];
    let jitter = match rng.try_fill_bytes(&mut buf) {
        Ok(()) => scale_into(u64::from_le_bytes(buf), half),
        Err(err) => {
            warn!(%err, "Entropy source unavailable, backing off without jitter");
            Duration::ZERO
        }
    };
    half.saturating_add(jitter)
}

fn base_backoff(attempt: u32, initial: Duration, max: Duration, multiplier: f64) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = initial.as_secs_f64() * multiplier.powi(exponent);
    if !secs.is_finite() || secs >= max.as_secs_f64() {
        return max;
    }
    if secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(secs).min(max)
}

/// Map a uniform u64 onto `[0, bound]`, both ends inclusive.
fn scale_into(random: u64, bound: Duration) -> Duration {
    let span = u128::from(u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX)) + 1;
    let nanos = (u128::from(random) * span) >> 64;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

impl RetryConfig {
    /// Jittered wait before retry number `attempt` (zero based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.initial_backoff,
            self.max_backoff,
            self.multiplier,
        )
    }
}
