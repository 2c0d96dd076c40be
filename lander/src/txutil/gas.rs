use synapse_core::{LedgerProvider, TypedTransaction, U256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::settings::validate_gas_buffer_percent;
use crate::txutil::cancellable;
use crate::{LanderError, LanderResult};

/// Fixed-point precision used when scaling by a float multiplier.
const MULTIPLIER_PRECISION: u64 = 1_000;

/// `gas + gas * percent / 100`.
pub fn apply_gas_buffer(gas: U256, percent: u64) -> U256 {
    let buffer = gas.saturating_mul(U256::from(percent)) / U256::from(100u64);
    gas.saturating_add(buffer)
}

/// Scale `value` by `multiplier`. Multipliers of 1 or less leave the value
/// untouched.
pub fn scale_by_multiplier(value: U256, multiplier: f64) -> U256 {
    if !multiplier.is_finite() || multiplier <= 1.0 {
        return value;
    }
    let scaled = (multiplier * MULTIPLIER_PRECISION as f64).round() as u64;
    value.saturating_mul(U256::from(scaled)) / U256::from(MULTIPLIER_PRECISION)
}

/// Estimate gas for `tx` and add a `buffer_percent` safety margin.
pub async fn estimate_gas_with_buffer(
    provider: &dyn LedgerProvider,
    tx: &TypedTransaction,
    buffer_percent: i64,
    cancel: &CancellationToken,
) -> LanderResult<U256> {
    validate_gas_buffer_percent(buffer_percent)?;
    let estimate = cancellable(cancel, provider.estimate_gas(tx))
        .await?
        .map_err(LanderError::GasEstimation)?;
    let gas = apply_gas_buffer(estimate, buffer_percent.unsigned_abs());
    debug!(%estimate, %gas, buffer_percent, "Estimated gas");
    Ok(gas)
}

pub async fn gas_price_with_multiplier(
    provider: &dyn LedgerProvider,
    multiplier: f64,
    cancel: &CancellationToken,
) -> LanderResult<U256> {
    let price = cancellable(cancel, provider.suggest_gas_price()).await??;
    Ok(scale_by_multiplier(price, multiplier))
}

pub async fn tip_cap_with_multiplier(
    provider: &dyn LedgerProvider,
    multiplier: f64,
    cancel: &CancellationToken,
) -> LanderResult<U256> {
    let tip = cancellable(cancel, provider.suggest_tip_cap()).await??;
    Ok(scale_by_multiplier(tip, multiplier))
}
