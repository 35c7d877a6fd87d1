//! Smooth bursty -type bucket

use core::time::Duration;

use crate::Error;

pub(crate) const MICROS_PER_SECOND: u64 = 1_000_000;

/// Interval used until the first rate is configured.
const UNCONFIGURED_INTERVAL_US: u64 = u32::MAX as u64;

/// The moment at which reserved permits become usable
///
/// Returned by [`BurstyBucket::reserve`]. The reservation has already been
/// committed; the caller only decides how to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    ready_at_us: u64,
    now_us: u64,
}

impl Reservation {
    /// Timestamp at which the permits may be used
    pub fn ready_at_us(&self) -> u64 {
        self.ready_at_us
    }

    /// Microseconds to wait, measured from the time the reservation was made
    pub fn wait_us(&self) -> u64 {
        self.ready_at_us.saturating_sub(self.now_us)
    }

    /// Same as [`Reservation::wait_us`] as a [`Duration`]
    pub fn wait(&self) -> Duration {
        Duration::from_micros(self.wait_us())
    }
}

/// Smooth bursty rate limiter state
///
/// Models a token bucket whose fill level is derived from elapsed time. Idle
/// time is banked as *stored permits*, up to `max_burst_seconds` worth of the
/// configured rate. Requests draw from the stored pool first, the remainder is
/// paid with *fresh permits* which cost one interval each.
///
/// A request is never made to wait for its own fresh permits. It is handed the
/// current next free ticket and pushes that ticket further out, so the next
/// caller pays the price.
///
/// The bucket takes `&mut self` and does no locking; [`crate::SmoothBursty`]
/// wraps it for sharing between threads.
pub struct BurstyBucket<T>
where
    T: Fn() -> u64,
{
    time_provider: T,
    max_burst_seconds: u32,
    stored_permits: u64,
    max_permits: u64,
    interval_us: u64,
    next_free_ticket_us: u64,
}

impl<T> BurstyBucket<T>
where
    T: Fn() -> u64,
{
    /// Initialize a new, unconfigured bucket utilizing the given timer
    ///
    /// # Arguments
    /// * `max_burst_seconds` - how many seconds worth of permits can be banked
    /// * `time_provider` - closure that returns a monotonically nondecreasing
    ///   timestamp as u64 microseconds
    ///
    /// The bucket throttles to a crawl until [`BurstyBucket::set_rate`] is called.
    ///
    /// # Panics
    /// If `max_burst_seconds` is zero.
    pub fn new_with_time_provider(max_burst_seconds: u32, time_provider: T) -> Self {
        match Self::try_new_with_time_provider(max_burst_seconds, time_provider) {
            Ok(bucket) => bucket,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible variant of [`BurstyBucket::new_with_time_provider`]
    pub fn try_new_with_time_provider(
        max_burst_seconds: u32,
        time_provider: T,
    ) -> Result<Self, Error> {
        if max_burst_seconds == 0 {
            return Err(Error::InvalidBurst { max_burst_seconds });
        }
        Ok(Self {
            time_provider,
            max_burst_seconds,
            stored_permits: 0,
            max_permits: 0,
            interval_us: UNCONFIGURED_INTERVAL_US,
            next_free_ticket_us: 0,
        })
    }

    /// Configure the rate
    ///
    /// # Panics
    /// If the rate is zero or above one permit per microsecond.
    pub fn set_rate(&mut self, permits_per_second: u32) {
        if let Err(e) = self.try_set_rate(permits_per_second) {
            panic!("{e}");
        }
    }

    /// Configure the rate, reporting precondition violations as errors
    ///
    /// Permits accumulated under the previous rate are credited first, then
    /// the stored pool is rescaled so that the same *fraction* of the burst
    /// window stays banked. The very first configuration fills the bucket.
    pub fn try_set_rate(&mut self, permits_per_second: u32) -> Result<(), Error> {
        let interval_us = interval_for(permits_per_second)?;

        self.resync((self.time_provider)());
        self.interval_us = interval_us;

        let old_max_permits = self.max_permits;
        self.max_permits = u64::from(self.max_burst_seconds) * u64::from(permits_per_second);
        self.stored_permits = if old_max_permits == 0 {
            self.max_permits
        } else {
            // stored <= old max, so the quotient fits back into u64
            (u128::from(self.stored_permits) * u128::from(self.max_permits)
                / u128::from(old_max_permits)) as u64
        };
        Ok(())
    }

    /// Reserve permits, committing to the moment they become usable
    ///
    /// # Panics
    /// If `permits` is zero.
    pub fn reserve(&mut self, permits: u32) -> Reservation {
        assert_ne!(permits, 0, "at least one permit must be requested");
        let now_us = (self.time_provider)();
        let ready_at_us = self.reserve_earliest_available(permits, now_us);
        Reservation {
            ready_at_us,
            now_us,
        }
    }

    /// Reserve permits only if they become usable within `timeout_us`
    ///
    /// On [`Error::Timeout`] nothing is reserved and the state is untouched.
    ///
    /// # Panics
    /// If `permits` is zero.
    pub fn reserve_within(&mut self, permits: u32, timeout_us: u64) -> Result<Reservation, Error> {
        assert_ne!(permits, 0, "at least one permit must be requested");
        let now_us = (self.time_provider)();
        if !self.can_acquire(now_us.saturating_add(timeout_us)) {
            return Err(Error::Timeout {
                wait_us: self.next_free_ticket_us - now_us,
            });
        }
        let ready_at_us = self.reserve_earliest_available(permits, now_us);
        Ok(Reservation {
            ready_at_us,
            now_us,
        })
    }

    /// Try to acquire permits without waiting
    ///
    /// # Returns
    /// * `0` - permits granted
    /// * `wait` - nothing granted, the microseconds until a retry can succeed
    ///
    /// # Panics
    /// If `permits` is zero.
    pub fn try_acquire(&mut self, permits: u32) -> u64 {
        assert_ne!(permits, 0, "at least one permit must be requested");
        let now_us = (self.time_provider)();
        if !self.can_acquire(now_us) {
            return self.next_free_ticket_us - now_us;
        }
        self.reserve_earliest_available(permits, now_us);
        0
    }

    #[cfg(feature = "std")]
    pub(crate) fn stored_permits(&self) -> u64 {
        self.stored_permits
    }

    #[cfg(feature = "std")]
    pub(crate) fn max_permits(&self) -> u64 {
        self.max_permits
    }

    #[cfg(feature = "std")]
    pub(crate) fn interval_us(&self) -> u64 {
        self.interval_us
    }

    /// Credit the permits banked since the next free ticket
    fn resync(&mut self, now_us: u64) {
        if now_us > self.next_free_ticket_us {
            let accrued = (now_us - self.next_free_ticket_us) / self.interval_us;
            self.stored_permits = self
                .max_permits
                .min(self.stored_permits.saturating_add(accrued));
            self.next_free_ticket_us = now_us;
        }
    }

    fn reserve_earliest_available(&mut self, required_permits: u32, now_us: u64) -> u64 {
        self.resync(now_us);
        let ready_at_us = self.next_free_ticket_us;

        let required = u64::from(required_permits);
        let from_store = required.min(self.stored_permits);
        let fresh = required - from_store;

        self.next_free_ticket_us = self
            .next_free_ticket_us
            .saturating_add(fresh.saturating_mul(self.interval_us));
        self.stored_permits -= from_store;
        ready_at_us
    }

    fn can_acquire(&self, now_us: u64) -> bool {
        now_us >= self.next_free_ticket_us
    }
}

/// Microseconds it takes to produce one permit at the given rate
fn interval_for(permits_per_second: u32) -> Result<u64, Error> {
    if permits_per_second == 0 {
        return Err(Error::InvalidRate { permits_per_second });
    }
    match MICROS_PER_SECOND / u64::from(permits_per_second) {
        0 => Err(Error::RateTooHigh { permits_per_second }),
        interval_us => Ok(interval_us),
    }
}
