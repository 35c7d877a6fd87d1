use core::sync::atomic::{AtomicU64, Ordering};

/// Manually driven microsecond clock
pub(crate) struct MockClock(AtomicU64);

impl MockClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(us: u64) -> Self {
        Self(AtomicU64::new(us))
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn advance(&self, us: u64) {
        self.0.fetch_add(us, Ordering::Relaxed);
    }

    /// Returns the current time and moves the clock `step` forward
    #[cfg(feature = "std")]
    pub fn step(&self, step: u64) -> u64 {
        self.0.fetch_add(step, Ordering::Relaxed)
    }
}
