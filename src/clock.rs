//! Wall-clock abstraction for cache expiry.
//!
//! Production code uses [`Clock::system()`]. Tests use [`Clock::manual()`]
//! and [`Clock::advance()`] to step past a TTL without sleeping.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::{OffsetDateTime, PrimitiveDateTime};

/// Source of the current time.
#[derive(Clone, Debug, Default)]
pub struct Clock {
    manual: Option<Arc<Mutex<OffsetDateTime>>>,
}

impl Clock {
    /// A clock reading the system time.
    pub fn system() -> Self {
        Self { manual: None }
    }

    /// A clock frozen at `start` until advanced. Clones share the same time.
    pub fn manual(start: OffsetDateTime) -> Self {
        Self {
            manual: Some(Arc::new(Mutex::new(start))),
        }
    }

    /// Current time.
    pub fn now(&self) -> OffsetDateTime {
        match &self.manual {
            Some(t) => *t.lock().unwrap_or_else(|e| e.into_inner()),
            None => OffsetDateTime::now_utc(),
        }
    }

    /// `ttl` from now, saturating at the largest representable time.
    pub fn deadline(&self, ttl: Duration) -> OffsetDateTime {
        let now = self.now();
        time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
    }

    /// Move a manual clock forward. No-op on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Some(t) = &self.manual {
            let mut guard = t.lock().unwrap_or_else(|e| e.into_inner());
            *guard += by;
        }
    }
}
