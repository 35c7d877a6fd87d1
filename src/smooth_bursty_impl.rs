//! Thread safe smooth bursty limiter

use core::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::bursty_bucket_impl::BurstyBucket;
use crate::clock::{monotonic_time_provider, sleep_us};
use crate::{Error, LimiterResult, RateLimiter};

/// Build a smooth bursty limiter on the monotonic system clock
///
/// # Arguments
/// * `max_burst_seconds` - how many seconds worth of permits can be banked
///
/// Call [`RateLimiter::set_rate`] before using the limiter.
///
/// ```
/// use smooth_bursty::RateLimiter;
///
/// let limiter = smooth_bursty::smooth_bursty(2);
/// limiter.set_rate(4);
/// limiter.acquire_one();
/// ```
///
/// # Panics
/// If `max_burst_seconds` is zero.
pub fn smooth_bursty(max_burst_seconds: u32) -> SmoothBursty<impl Fn() -> u64 + Send + Sync> {
    SmoothBursty::new_with_time_provider(max_burst_seconds, monotonic_time_provider())
}

/// Smooth bursty rate limiter
///
/// Shares one [`BurstyBucket`] between threads behind a lock owned by this
/// instance. Reservations are made in lock acquisition order; waiting
/// happens outside the lock so a sleeping caller never holds up others.
pub struct SmoothBursty<T>
where
    T: Fn() -> u64,
{
    bucket: Mutex<BurstyBucket<T>>,
}

impl<T> SmoothBursty<T>
where
    T: Fn() -> u64,
{
    /// Initialize a new limiter utilizing the given timer
    ///
    /// # Arguments
    /// * `max_burst_seconds` - how many seconds worth of permits can be banked
    /// * `time_provider` - closure that returns a monotonically nondecreasing
    ///   timestamp as u64 microseconds
    ///
    /// If you are developing for a `std` target, you probably wish to use [`smooth_bursty`]
    ///
    /// # Panics
    /// If `max_burst_seconds` is zero.
    pub fn new_with_time_provider(max_burst_seconds: u32, time_provider: T) -> Self {
        Self {
            bucket: Mutex::new(BurstyBucket::new_with_time_provider(
                max_burst_seconds,
                time_provider,
            )),
        }
    }

    /// Fallible variant of [`SmoothBursty::new_with_time_provider`]
    pub fn try_new_with_time_provider(
        max_burst_seconds: u32,
        time_provider: T,
    ) -> Result<Self, Error> {
        let bucket = BurstyBucket::try_new_with_time_provider(max_burst_seconds, time_provider)?;
        Ok(Self {
            bucket: Mutex::new(bucket),
        })
    }
}

impl<T> RateLimiter for SmoothBursty<T>
where
    T: Fn() -> u64,
{
    fn do_set_rate(&self, permits_per_second: u32) -> Result<(), Error> {
        let (interval_us, max_permits, stored_permits) = {
            let mut bucket = self.bucket.lock();
            bucket.try_set_rate(permits_per_second)?;
            (
                bucket.interval_us(),
                bucket.max_permits(),
                bucket.stored_permits(),
            )
        };
        debug!(
            permits_per_second,
            interval_us, max_permits, stored_permits, "rate configured"
        );
        Ok(())
    }

    fn acquire(&self, permits: u32) {
        let reservation = self.bucket.lock().reserve(permits);
        let wait_us = reservation.wait_us();
        if wait_us > 0 {
            trace!(permits, wait_us, "waiting for permits");
            sleep_us(wait_us);
        }
    }

    fn try_acquire(&self, permits: u32) -> u64 {
        self.bucket.lock().try_acquire(permits)
    }

    fn acquire_timeout(&self, permits: u32, timeout: Duration) -> LimiterResult {
        let timeout_us = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        let result = self.bucket.lock().reserve_within(permits, timeout_us);
        match result {
            Ok(reservation) => {
                sleep_us(reservation.wait_us());
                Ok(())
            }
            Err(e) => {
                trace!(permits, timeout_us, error = %e, "acquire timed out");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::mock_assets::MockClock;
    use crate::{Error, RateLimiter};

    use super::{smooth_bursty, SmoothBursty};

    #[test]
    fn burst_is_served_then_throttled() {
        let limiter = smooth_bursty(2);
        limiter.set_rate(4);
        {
            let bucket = limiter.bucket.lock();
            assert_eq!(bucket.interval_us(), 250_000);
            assert_eq!(bucket.max_permits(), 8);
            assert_eq!(bucket.stored_permits(), 8);
        }

        // Eight banked permits plus one fresh permit charged to the next caller
        let start = Instant::now();
        for _ in 0..9 {
            limiter.acquire_one();
        }
        assert!(start.elapsed() < Duration::from_millis(150));

        let start = Instant::now();
        limiter.acquire_one();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(200), "waited {waited:?}");
        assert!(waited < Duration::from_secs(1), "waited {waited:?}");
    }

    #[test]
    fn try_acquire_reports_wait_without_consuming() {
        let clock = MockClock::starting_at(5_000_000);
        let limiter = SmoothBursty::new_with_time_provider(1, || clock.now());
        limiter.set_rate(1);

        assert_eq!(limiter.try_acquire_one(), 0);
        assert_eq!(limiter.try_acquire_one(), 0);
        clock.advance(700_000);
        assert_eq!(limiter.try_acquire_one(), 300_000);
        assert_eq!(limiter.try_acquire(5), 300_000);
        assert_eq!(limiter.bucket.lock().stored_permits(), 0);

        clock.advance(300_000);
        assert_eq!(limiter.try_acquire_one(), 0);
    }

    #[test]
    fn acquire_timeout_gives_up_without_reserving() {
        let clock = MockClock::starting_at(5_000_000);
        let limiter = SmoothBursty::new_with_time_provider(1, || clock.now());
        limiter.set_rate(2);
        limiter.acquire(3);

        assert_eq!(
            limiter.acquire_timeout(1, Duration::from_millis(100)),
            Err(Error::Timeout { wait_us: 500_000 })
        );
        assert_eq!(limiter.try_acquire_one(), 500_000);
    }

    #[test]
    fn acquire_timeout_waits_when_within_bound() {
        let limiter = smooth_bursty(1);
        limiter.set_rate(2);
        limiter.acquire(3);

        assert!(matches!(
            limiter.acquire_timeout(1, Duration::from_millis(10)),
            Err(Error::Timeout { .. })
        ));

        let start = Instant::now();
        assert!(limiter.acquire_timeout(1, Duration::from_secs(5)).is_ok());
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn threads_share_one_bucket() {
        let clock = MockClock::starting_at(5_000_000);
        let limiter = SmoothBursty::new_with_time_provider(1, || clock.now());
        limiter.set_rate(1000);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        limiter.acquire_one();
                    }
                });
            }
        });
        assert_eq!(limiter.bucket.lock().stored_permits(), 200);
    }

    #[test]
    fn concurrent_probes_grant_exactly_the_available_permits() {
        let clock = MockClock::starting_at(5_000_000);
        let limiter = SmoothBursty::new_with_time_provider(1, || clock.now());
        limiter.set_rate(1);

        let granted: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|_| s.spawn(|| limiter.try_acquire_one()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|wait| *wait == 0)
                .count()
        });
        // One stored permit and one fresh permit paid forward
        assert_eq!(granted, 2);
    }

    #[test]
    fn limiters_do_not_share_state() {
        let a = smooth_bursty(1);
        let b = smooth_bursty(1);
        a.set_rate(1);
        b.set_rate(1);
        a.acquire(2);

        assert!(a.try_acquire_one() > 0);
        assert_eq!(b.try_acquire_one(), 0);
    }

    #[test]
    fn invalid_rates_are_errors() {
        let limiter = smooth_bursty(1);
        assert_eq!(
            limiter.try_set_rate(0),
            Err(Error::InvalidRate {
                permits_per_second: 0
            })
        );
        assert_eq!(
            limiter.try_set_rate(2_000_000),
            Err(Error::RateTooHigh {
                permits_per_second: 2_000_000
            })
        );
        assert!(SmoothBursty::try_new_with_time_provider(0, || 0).is_err());
    }

    #[test]
    #[should_panic(expected = "invalid rate")]
    fn zero_rate_panics() {
        smooth_bursty(2).set_rate(0);
    }

    #[test]
    #[should_panic(expected = "invalid burst window")]
    fn zero_burst_panics() {
        let _ = smooth_bursty(0);
    }
}
