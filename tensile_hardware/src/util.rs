use std::time::Duration;

use tensile_traits::Clock;

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals on `clock` to avoid CPU spinning.
pub fn wait_until_low_with_timeout<C: Clock + ?Sized>(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
    clock: &C,
) -> Result<()> {
    let deadline = clock.now() + timeout;
    while is_high() {
        if clock.now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        clock.sleep(poll_interval);
    }
    Ok(())
}
