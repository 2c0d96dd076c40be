//! Transaction reliability primitives.

pub use backoff::{calculate_backoff, calculate_backoff_with_rng};
pub use classify::{is_already_known, is_gas_error, is_nonce_error, is_retryable_error, ErrorCause};
pub use gas::{
    apply_gas_buffer, estimate_gas_with_buffer, gas_price_with_multiplier, scale_by_multiplier,
    tip_cap_with_multiplier,
};
pub use nonce::{NonceGuard, NonceManager};
pub use receipt::ReceiptWaiter;
pub use retry::{cancellable, poll_until, retry_with_backoff, sleep_or_cancel};
pub use submit::SubmissionRetrier;

mod backoff;
mod classify;
mod gas;
mod nonce;
mod receipt;
mod retry;
mod submit;
