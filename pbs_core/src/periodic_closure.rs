// Copyright 2026 the PBS client authors. MIT license.
//! A background thread that invokes a closure at a fixed interval, with an
//! optional startup delay. Grounded on `cc/core/thread/periodic_closure.h`
//! / `.cc`; `Start`/`Stop` remain idempotent under concurrent callers, and
//! if a closure runs longer than `interval` the next run is scheduled for
//! the next interval boundary after it finishes (no catch-up bursts).

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
  #[error("periodic closure is already running")]
  AlreadyRunning,
  #[error("periodic closure has already run and been stopped")]
  AlreadyRan,
}

struct StopSignal {
  mutex: Mutex<bool>,
  condvar: Condvar,
}

impl StopSignal {
  fn new() -> Self {
    StopSignal { mutex: Mutex::new(false), condvar: Condvar::new() }
  }

  /// Waits up to `timeout`, returning `true` if the signal fired before
  /// the timeout elapsed.
  fn wait_timeout(&self, timeout: Duration) -> bool {
    let guard = self.mutex.lock().unwrap();
    let (guard, _) = self
      .condvar
      .wait_timeout_while(guard, timeout, |&mut signalled| !signalled)
      .unwrap();
    *guard
  }

  fn notify(&self) {
    let mut guard = self.mutex.lock().unwrap();
    *guard = true;
    self.condvar.notify_all();
  }
}

/// A thread-safe utility for executing a closure periodically in a
/// background thread. The closure is invoked without synchronization
/// protection of its own; callers must protect any shared state it
/// touches.
pub struct PeriodicClosure {
  interval: Duration,
  startup_delay: Duration,
  state: AtomicU8,
  stop_signal: Mutex<Option<Arc<StopSignal>>>,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicClosure {
  pub fn new(interval: Duration, startup_delay: Duration) -> Self {
    PeriodicClosure {
      interval,
      startup_delay,
      state: AtomicU8::new(IDLE),
      stop_signal: Mutex::new(None),
      handle: Mutex::new(None),
    }
  }

  /// Starts periodic execution of `closure`. Blocks until the background
  /// thread is spawned. Returns `AlreadyRunning` or `AlreadyRan` if
  /// called a second time -- a `PeriodicClosure` cannot be restarted once
  /// stopped.
  pub fn start(
    &self,
    mut closure: impl FnMut() + Send + 'static,
  ) -> Result<(), StartError> {
    match self.state.compare_exchange(
      IDLE,
      RUNNING,
      Ordering::SeqCst,
      Ordering::SeqCst,
    ) {
      Ok(_) => {}
      Err(RUNNING) => return Err(StartError::AlreadyRunning),
      Err(_) => return Err(StartError::AlreadyRan),
    }

    let signal = Arc::new(StopSignal::new());
    *self.stop_signal.lock().unwrap() = Some(signal.clone());

    let interval = self.interval;
    let startup_delay = self.startup_delay;

    let handle = std::thread::spawn(move || {
      if !startup_delay.is_zero() && signal.wait_timeout(startup_delay) {
        return;
      }
      let mut next_scheduled = Instant::now();
      loop {
        closure();
        next_scheduled += interval;
        let now = Instant::now();
        if next_scheduled <= now {
          // The closure overran the interval; skip to the next interval
          // boundary strictly after completion instead of bursting.
          let elapsed_since_schedule = now - next_scheduled;
          let missed_intervals = elapsed_since_schedule.as_nanos() / interval.as_nanos().max(1);
          next_scheduled += interval * (missed_intervals as u32 + 1);
        }
        let wait_for = next_scheduled.saturating_duration_since(Instant::now());
        if signal.wait_timeout(wait_for) {
          return;
        }
      }
    });

    *self.handle.lock().unwrap() = Some(handle);
    Ok(())
  }

  /// Signals the background thread to stop and blocks until it has
  /// terminated (a running closure is allowed to finish first). Idempotent:
  /// calling `stop` more than once always succeeds.
  pub fn stop(&self) {
    if let Some(signal) = self.stop_signal.lock().unwrap().take() {
      signal.notify();
    }
    self.state.store(STOPPED, Ordering::SeqCst);
    if let Some(handle) = self.handle.lock().unwrap().take() {
      let _ = handle.join();
    }
  }

  pub fn is_running(&self) -> bool {
    self.state.load(Ordering::SeqCst) == RUNNING
  }
}

impl Drop for PeriodicClosure {
  fn drop(&mut self) {
    self.stop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;

  #[test]
  fn runs_closure_periodically() {
    let closure = PeriodicClosure::new(Duration::from_millis(20), Duration::ZERO);
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    closure
      .start(move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
      })
      .unwrap();
    std::thread::sleep(Duration::from_millis(90));
    closure.stop();
    let n = count.load(Ordering::SeqCst);
    assert!(n >= 3, "expected at least 3 invocations, got {n}");
  }

  #[test]
  fn startup_delay_postpones_first_run() {
    let closure = PeriodicClosure::new(Duration::from_millis(500), Duration::from_millis(40));
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    closure
      .start(move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
      })
      .unwrap();
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    closure.stop();
  }

  #[test]
  fn start_is_not_reentrant() {
    let closure = PeriodicClosure::new(Duration::from_millis(50), Duration::ZERO);
    closure.start(|| {}).unwrap();
    let err = closure.start(|| {}).unwrap_err();
    assert_eq!(err, StartError::AlreadyRunning);
    closure.stop();
    let err = closure.start(|| {}).unwrap_err();
    assert_eq!(err, StartError::AlreadyRan);
  }

  #[test]
  fn stop_is_idempotent() {
    let closure = PeriodicClosure::new(Duration::from_millis(50), Duration::ZERO);
    closure.start(|| {}).unwrap();
    closure.stop();
    closure.stop();
    assert!(!closure.is_running());
  }
}
