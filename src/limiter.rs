//! Rate limiter contract

use core::time::Duration;

use crate::{Error, LimiterResult};

/// A permit-issuing rate limiter
///
/// Methods take `&self`: a limiter is meant to be shared by every thread
/// that talks to the throttled resource. Implementations provide the
/// scheduling strategy through [`RateLimiter::do_set_rate`] and the acquire
/// methods; rate validation is common to all of them.
pub trait RateLimiter {
    /// Configure the steady state rate in permits per second
    ///
    /// # Panics
    /// If `permits_per_second` is zero or the strategy rejects the rate.
    fn set_rate(&self, permits_per_second: u32) {
        if let Err(e) = self.try_set_rate(permits_per_second) {
            panic!("{e}");
        }
    }

    /// Configure the rate, reporting precondition violations as errors
    fn try_set_rate(&self, permits_per_second: u32) -> Result<(), Error> {
        if permits_per_second < 1 {
            return Err(Error::InvalidRate { permits_per_second });
        }
        self.do_set_rate(permits_per_second)
    }

    /// Strategy specific rate configuration, called by [`RateLimiter::try_set_rate`]
    /// with an already validated rate
    fn do_set_rate(&self, permits_per_second: u32) -> Result<(), Error>;

    /// Block the calling thread until `permits` are available and consume them
    fn acquire(&self, permits: u32);

    /// Acquire a single permit
    fn acquire_one(&self) {
        self.acquire(1)
    }

    /// Acquire `permits` without blocking
    ///
    /// # Returns
    /// * `0` - permits granted
    /// * `wait` - nothing granted, microseconds to wait before retrying
    fn try_acquire(&self, permits: u32) -> u64;

    /// Try to acquire a single permit
    fn try_acquire_one(&self) -> u64 {
        self.try_acquire(1)
    }

    /// Acquire `permits`, blocking for at most `timeout`
    ///
    /// If the permits cannot be ready within `timeout` nothing is acquired and
    /// [`Error::Timeout`] is returned right away. Otherwise the permits are
    /// reserved and the full wait is honored.
    fn acquire_timeout(&self, permits: u32, timeout: Duration) -> LimiterResult;
}
