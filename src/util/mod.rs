mod clock;
mod timer;

pub use clock::{Clock, HostClock, ManualClock, NANOS_PER_SEC};
pub use timer::Timer;

/// Computes `a * b / c` without overflowing the intermediate product.
pub fn muldiv64(a: u64, b: u64, c: u64) -> u64 {
    if c == 0 {
        return 0;
    }
    ((a as u128 * b as u128) / c as u128) as u64
}
