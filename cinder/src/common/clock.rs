use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the epoch, or zero if the clock is before it.
#[inline]
pub fn get_current_time_or_zero() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Time source for the rate governor's sliding windows.
///
/// `Clock::system()` reads the wall clock. `Clock::manual(start)` only
/// moves when told to, which makes window-expiry behavior testable without
/// sleeping. Clones of a manual clock share the same instant.
#[derive(Clone, Debug, Default)]
pub enum Clock {
    #[default]
    System,
    Manual(Arc<AtomicU64>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System
    }

    pub fn manual(start_millis: u64) -> Self {
        Clock::Manual(Arc::new(AtomicU64::new(start_millis)))
    }

    #[inline]
    pub fn now_millis(&self) -> u64 {
        match self {
            Clock::System => get_current_time_or_zero(),
            Clock::Manual(now) => now.load(Ordering::SeqCst),
        }
    }

    /// Moves a manual clock forward. No-op on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(now) = self {
            now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        } else {
            log::warn!("Ignoring attempt to advance the system clock");
        }
    }
}
