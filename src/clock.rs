//! Strictly-monotonic timestamp generation for the post store
//!
//! Wire timestamps are whole seconds since the Unix epoch, but [`PostStore`](crate::room::traits::PostStore)
//! requires every stored post to carry a *unique* timestamp. [`UniqueClock`] wraps a
//! [`TimeProvider`] and advances by one tick whenever the wall clock would otherwise
//! repeat a value it already handed out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::UNIX_EPOCH;

use crate::time_provider::SharedTimeProvider;

/// Hands out strictly increasing `u32` timestamps derived from a [`TimeProvider`].
#[derive(Debug)]
pub struct UniqueClock {
    time: SharedTimeProvider,
    last: AtomicU32,
}

impl UniqueClock {
    /// Build a clock over the given time source.
    #[must_use]
    pub fn new(time: SharedTimeProvider) -> Self {
        Self {
            time,
            last: AtomicU32::new(0),
        }
    }

    /// Build a clock wrapped in an `Arc`, convenient for sharing across components.
    #[must_use]
    pub fn shared(time: SharedTimeProvider) -> Arc<Self> {
        Arc::new(Self::new(time))
    }

    /// Produce the next unique timestamp, advancing past the wall clock if needed.
    pub fn unique_now(&self) -> u32 {
        let wall = self
            .time
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
            .unwrap_or(0);

        loop {
            let prev = self.last.load(Ordering::Acquire);
            let next = if wall > prev { wall } else { prev.saturating_add(1) };
            if self
                .last
                .compare_exchange(prev, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return next;
            }
        }
    }

    /// Plain (non-unique) current timestamp, used for anything that doesn't go
    /// into the post store (contact/client `last_mod`/`last_activity`, ACK deadlines).
    #[must_use]
    pub fn now(&self) -> u32 {
        self.time
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_provider::MockTimeProvider;

    #[test]
    fn advances_on_collision() {
        let clock = UniqueClock::new(Arc::new(MockTimeProvider::new()));
        let a = clock.unique_now();
        let b = clock.unique_now();
        let c = clock.unique_now();
        assert!(a < b);
        assert!(b < c);
    }
}
