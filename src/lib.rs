//! # Smooth bursty
//!
//! A permit-issuing rate limiter. Callers are admitted at a bounded long-term
//! rate, while permits banked during idle time can be spent immediately.
//!
//! The bucket is never refilled by a background thread. Every operation lazily
//! credits the permits that accumulated since the last time the limiter was
//! touched, and requests that the stored pool cannot cover are scheduled one
//! interval apart.
//!
//! ## Available types
//!
//! * [`RateLimiter`] - the limiter contract
//! * [`SmoothBursty`] - thread safe, blocking limiter (`std` only)
//! * [`BurstyBucket`] - the underlying single owner state machine
//!
//! ## Platform support
//!
//! On `std` targets you can build a limiter on the monotonic system clock with
//! [`smooth_bursty`].
//!
//! On `no_std` targets only [`BurstyBucket`] is available and you'll have to
//! provide a closure that returns a monotonically nondecreasing timestamp as
//! `u64` microseconds:
//!
//! ```
//! use core::sync::atomic::{AtomicU64, Ordering};
//!
//! let ticks = AtomicU64::new(1_000_000);
//! let mut bucket =
//!     smooth_bursty::BurstyBucket::new_with_time_provider(1, || ticks.load(Ordering::Relaxed));
//! bucket.set_rate(2);
//!
//! assert_eq!(bucket.try_acquire(3), 0);
//! assert_eq!(bucket.try_acquire(1), 500_000);
//! ```

// Support no_std
#![cfg_attr(not(feature = "std"), no_std)]

mod bursty_bucket_impl;
#[cfg(feature = "std")]
mod clock;
mod limiter;
#[cfg(feature = "std")]
mod smooth_bursty_impl;

#[cfg(test)]
mod mock_assets;

use core::fmt;

pub use bursty_bucket_impl::{BurstyBucket, Reservation};
pub use limiter::RateLimiter;

#[cfg(feature = "std")]
pub use smooth_bursty_impl::{smooth_bursty, SmoothBursty};

/// Errors reported by the limiter.
///
/// Everything except [`Error::Timeout`] is a precondition violation. The
/// panicking API ([`RateLimiter::set_rate`], the constructors) aborts with
/// these, the `try_*` variants hand them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Rates below one permit per second are not allowed.
    InvalidRate {
        /// The rejected rate.
        permits_per_second: u32,
    },
    /// The burst window must be at least one second.
    InvalidBurst {
        /// The rejected burst window.
        max_burst_seconds: u32,
    },
    /// The rate is so high that one permit would cost less than a microsecond.
    RateTooHigh {
        /// The rejected rate.
        permits_per_second: u32,
    },
    /// The permits would not become available within the allowed wait.
    Timeout {
        /// How long the caller would have had to wait.
        wait_us: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRate { permits_per_second } => write!(
                f,
                "invalid rate {permits_per_second}/s, at least one permit per second is required"
            ),
            Error::InvalidBurst { max_burst_seconds } => write!(
                f,
                "invalid burst window {max_burst_seconds}s, must be greater than zero"
            ),
            Error::RateTooHigh { permits_per_second } => write!(
                f,
                "rate {permits_per_second}/s exceeds one permit per microsecond"
            ),
            Error::Timeout { wait_us } => {
                write!(f, "permits not available for another {wait_us}us")
            }
        }
    }
}

// core::error::Error trait stabilised at release 1.81
#[rustversion::since(1.81)]
impl core::error::Error for Error {}

/// Result type of the timeout aware acquire
pub type LimiterResult = Result<(), Error>;
