mod bulk_waker;
mod timeout_controller;
mod wake_timer;

#[cfg(test)]
pub(crate) mod testing;

pub use bulk_waker::BulkWaker;
pub use timeout_controller::SessionTimeoutController;
pub use wake_timer::{PUSH_BEFORE_TIMEOUT_PERIOD, WakeOutcome, WakeTimerManager, wake_delay};
