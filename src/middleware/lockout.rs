use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result, MAX_LOCKOUT_SECS};

#[derive(Debug, Default)]
struct LockState {
    until: Option<Instant>,
}

/// Remembers a server-imposed login lockout so further attempts are refused
/// locally until it elapses.
#[derive(Clone, Debug, Default)]
pub struct LockoutGuard {
    state: Arc<Mutex<LockState>>,
}

impl LockoutGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LockState> {
        // State is a single Option, so a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn engage(&self, lockout_secs: u64) {
        self.engage_at(Instant::now(), lockout_secs);
    }

    /// Lockouts longer than [`MAX_LOCKOUT_SECS`] are clamped to it.
    pub fn engage_at(&self, now: Instant, lockout_secs: u64) {
        let span = Duration::from_secs(lockout_secs.min(MAX_LOCKOUT_SECS));
        self.lock().until = Some(now.checked_add(span).unwrap_or(now));
    }

    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let mut guard = self.lock();
        match guard.until {
            Some(until) if until > now => Some(until - now),
            Some(_) => {
                guard.until = None;
                None
            }
            None => None,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    /// `Err(Locked)` with the seconds left, rounded up, while locked out.
    pub fn check(&self) -> Result<()> {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> Result<()> {
        match self.remaining_at(now) {
            Some(left) => Err(Error::Locked {
                lockout_secs: left.as_secs() + u64::from(left.subsec_nanos() > 0),
            }),
            None => Ok(()),
        }
    }

    /// Engages the guard when `result` is a lockout and passes it through.
    pub fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(Error::Locked { lockout_secs }) = &result {
            self.engage(*lockout_secs);
        }
        result
    }

    pub fn clear(&self) {
        self.lock().until = None;
    }
}
