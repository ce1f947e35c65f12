// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the timestamps the pipeline stamps onto entries.
pub trait Clock: Send + Sync {
    /// Unix time in nanoseconds.
    fn now_nanos(&self) -> i64;
}

/// Wall clock that never repeats or goes backwards.
///
/// Loki rejects out of order lines within a stream, so when the system clock
/// stalls or steps back the previous value plus one nanosecond is returned.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or_default();

        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_nanos(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_strictly_increasing() {
        let clock = SystemClock::new();
        let mut previous = clock.now_nanos();
        assert!(previous > 0);
        for _ in 0..10_000 {
            let next = clock.now_nanos();
            assert!(next > previous, "{next} <= {previous}");
            previous = next;
        }
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(42).now_nanos(), 42);
    }
}
