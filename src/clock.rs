//! Time source and sleeping for `std` targets

use std::thread;
use std::time::{Duration, Instant};

use crate::bursty_bucket_impl::MICROS_PER_SECOND;

/// Build a time provider on the monotonic system clock
///
/// The returned closure reports the microseconds elapsed since this function
/// was called. Wall clock adjustments never move it backwards.
pub(crate) fn monotonic_time_provider() -> impl Fn() -> u64 + Send + Sync {
    let epoch = Instant::now();
    move || u64::try_from(epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Block the calling thread for `us` microseconds
pub(crate) fn sleep_us(us: u64) {
    if us == 0 {
        return;
    }
    let seconds = Duration::from_secs(us / MICROS_PER_SECOND);
    let remainder = Duration::from_micros(us % MICROS_PER_SECOND);
    thread::sleep(seconds + remainder);
}
