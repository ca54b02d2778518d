// Copyright 2026 the PBS client authors. MIT license.
//! An abstract, mockable source of monotonic time, grounded on
//! `cc/core/thread/clock.h`. Production code drives off the real
//! monotonic clock; tests substitute a `SimulatedClock` that advances only
//! on explicit calls, so `PeriodicClosure` and expiration-deadline tests
//! are deterministic.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Instant;

use once_cell::sync::Lazy;

/// Monotonic nanoseconds since an unspecified, process-local epoch.
pub type Timestamp = u64;

/// Abstract source of monotonic time.
pub trait Clock: Send + Sync {
  fn now_nanos(&self) -> Timestamp;
}

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// The real wall clock, backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_nanos(&self) -> Timestamp {
    PROCESS_START.elapsed().as_nanos() as Timestamp
  }
}

/// A clock that only moves forward when `advance` is called explicitly.
/// Used by tests that need deterministic control over expiration and
/// `PeriodicClosure` scheduling.
#[derive(Debug)]
pub struct SimulatedClock {
  nanos: AtomicU64,
}

impl SimulatedClock {
  pub fn new() -> Self {
    SimulatedClock { nanos: AtomicU64::new(0) }
  }

  pub fn advance(&self, duration: std::time::Duration) {
    self.nanos.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
  }
}

impl Default for SimulatedClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for SimulatedClock {
  fn now_nanos(&self) -> Timestamp {
    self.nanos.load(Ordering::SeqCst)
  }
}

/// A simulated clock behind a mutex, exposed for tests that need to share
/// a single clock handle across threads without pinning `SimulatedClock`
/// behind an externally-provided `Arc`.
#[derive(Debug, Default)]
pub struct SharedSimulatedClock(Mutex<SimulatedClockState>);

#[derive(Debug, Default)]
struct SimulatedClockState {
  nanos: u64,
}

impl SharedSimulatedClock {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn advance(&self, duration: std::time::Duration) {
    let mut state = self.0.lock().unwrap();
    state.nanos += duration.as_nanos() as u64;
  }
}

impl Clock for SharedSimulatedClock {
  fn now_nanos(&self) -> Timestamp {
    self.0.lock().unwrap().nanos
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::time::Duration;

  #[test]
  fn simulated_clock_only_advances_explicitly() {
    let clock = SimulatedClock::new();
    assert_eq!(clock.now_nanos(), 0);
    clock.advance(Duration::from_secs(1));
    assert_eq!(clock.now_nanos(), 1_000_000_000);
    assert_eq!(clock.now_nanos(), 1_000_000_000);
  }

  #[test]
  fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let first = clock.now_nanos();
    let second = clock.now_nanos();
    assert!(second >= first);
  }
}
