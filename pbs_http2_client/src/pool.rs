// Copyright 2026 the PBS client authors. MIT license.
//! Round-robin connection pool keyed by `host:service`, grounded on
//! `cc/core/http2_client/src/http_connection_pool.{h,cc}`. `GetConnection`
//! reproduces the original's four steps verbatim (spec.md §4.4): parse,
//! lazily create `max_connections_per_host` connections on first use,
//! round-robin select, recycle-and-retry a dropped pick.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use parking_lot::Mutex;

use pbs_core::result::retry;
use pbs_core::ConcurrentMap;
use pbs_core::ExecutionResult;
use pbs_core::StatusCode;
use pbs_telemetry::instruments;
use pbs_telemetry::MetricRouter;

use crate::connection::HttpConnection;
use crate::uri::parse_uri;

pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 2;

struct HttpConnectionPoolEntry {
  connections: Vec<Arc<HttpConnection>>,
  is_initialized: AtomicBool,
  order_counter: AtomicU64,
}

impl HttpConnectionPoolEntry {
  fn new() -> Self {
    HttpConnectionPoolEntry {
      connections: Vec::new(),
      is_initialized: AtomicBool::new(false),
      order_counter: AtomicU64::new(0),
    }
  }
}

/// Pools `HttpConnection`s per `host:service`, created lazily and reused
/// round-robin. `recycle_connection` is serialized by a mutex so two
/// callers that both observe a dropped connection don't double-recycle
/// it, matching the original's `connection_lock_`.
pub struct HttpConnectionPool {
  max_connections_per_host: usize,
  read_timeout: Duration,
  sessions: ConcurrentMap<String, Arc<Mutex<HttpConnectionPoolEntry>>>,
  recycle_lock: Mutex<()>,
  metric_router: Option<MetricRouter>,
  address_errors_counter: Option<opentelemetry::metrics::Counter<u64>>,
}

impl HttpConnectionPool {
  pub fn new(
    max_connections_per_host: usize,
    read_timeout: Duration,
    metric_router: Option<MetricRouter>,
  ) -> Self {
    let address_errors_counter = metric_router.as_ref().map(|router| {
      let meter = router.get_or_create_meter("pbs_http2_client.pool");
      router.counter(&meter, instruments::HTTP_CLIENT_ADDRESS_ERRORS)
    });
    HttpConnectionPool {
      max_connections_per_host,
      read_timeout,
      sessions: ConcurrentMap::new(),
      recycle_lock: Mutex::new(()),
      metric_router,
      address_errors_counter,
    }
  }

  /// Registers the observable gauges for open connections and active
  /// requests, summed across every pooled entry. Mirrors
  /// `ObserveClientOpenConnectionsCallback`/`ObserveClientActiveRequestsCallback`.
  pub fn register_observable_gauges(self: &Arc<Self>) {
    let Some(router) = &self.metric_router else { return };
    let meter = router.get_or_create_meter("pbs_http2_client.pool");

    let this = Arc::clone(self);
    router.observable_gauge_u64(&meter, instruments::HTTP_CLIENT_OPEN_CONNECTIONS, move || {
      this.sessions.values().iter().map(|entry| entry.lock().connections.len() as u64).sum()
    });

    let this = Arc::clone(self);
    router.observable_gauge_u64(&meter, instruments::HTTP_CLIENT_ACTIVE_REQUESTS, move || {
      this
        .sessions
        .values()
        .iter()
        .flat_map(|entry| entry.lock().connections.clone())
        .map(|connection| connection.active_client_requests_size() as u64)
        .sum()
    });
  }

  fn increment_address_error(&self, uri: &str) {
    if let Some(counter) = &self.address_errors_counter {
      counter.add(1, &[KeyValue::new("uri", uri.to_string())]);
    }
  }

  /// Gets (creating on first use) a connection for `uri`. Returns
  /// `Retry(NoConnectionEstablished)` both while the pool entry's
  /// connections are still being established by a racing caller, and
  /// when the round-robin pick turned out to be dropped (after
  /// recycling it for the next caller).
  pub fn get_connection(&self, uri: &str) -> Result<Arc<HttpConnection>, ExecutionResult> {
    let parsed = parse_uri(uri).map_err(|result| {
      self.increment_address_error(uri);
      result
    })?;
    let pool_key = parsed.pool_key();

    let new_entry = Arc::new(Mutex::new(HttpConnectionPoolEntry::new()));
    let (outcome, entry) = self.sessions.insert(pool_key.clone(), new_entry.clone());
    if outcome == pbs_core::concurrent_map::InsertOutcome::Inserted {
      if let Err(result) = self.init_pool_entry(&entry, &parsed) {
        self.sessions.erase(&pool_key);
        return Err(result);
      }
    }

    if !entry.lock().is_initialized.load(Ordering::SeqCst) {
      return Err(retry(StatusCode::Http2ClientNoConnectionEstablished));
    }

    let guard = entry.lock();
    let index = guard.order_counter.fetch_add(1, Ordering::SeqCst) as usize
      % self.max_connections_per_host;
    let connection = guard.connections[index].clone();
    let all_connections = guard.connections.clone();
    drop(guard);

    if connection.is_dropped() {
      self.recycle_connection(&connection)?;
      return Err(retry(StatusCode::Http2ClientNoConnectionEstablished));
    }

    if connection.is_ready() {
      return Ok(connection);
    }

    // Not dropped but not yet Ready either (still Initializing): scan
    // forward for the next Ready slot rather than fail the whole pick on
    // one slow connect, matching spec.md §4.4 step 4.
    for offset in 1..self.max_connections_per_host {
      let candidate = all_connections[(index + offset) % self.max_connections_per_host].clone();
      if candidate.is_ready() {
        return Ok(candidate);
      }
    }
    Err(retry(StatusCode::Http2ClientHttpConnectionNotReady))
  }

  /// Eagerly creates and connects `max_connections_per_host` connections
  /// for a freshly-inserted pool entry. Leaves `entry` untouched on
  /// failure -- the caller is responsible for erasing the pool entry, per
  /// spec.md §4.4 step 2 ("if any Init/Run fails, Erase the pool entry and
  /// propagate the error").
  fn init_pool_entry(
    &self,
    entry: &Arc<Mutex<HttpConnectionPoolEntry>>,
    parsed: &crate::uri::ParsedUri,
  ) -> Result<(), ExecutionResult> {
    let mut guard = entry.lock();
    for _ in 0..self.max_connections_per_host {
      let connection = Arc::new(HttpConnection::new(
        parsed.host.clone(),
        parsed.service.clone(),
        parsed.is_https,
        self.read_timeout,
        self.metric_router.as_ref(),
      ));
      connection.init()?;
      connection.run()?;
      guard.connections.push(connection);
    }
    guard.is_initialized.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Stops, resets, and re-initializes a dropped connection in place so
  /// its slot in the round-robin vector keeps working for future callers.
  fn recycle_connection(&self, connection: &Arc<HttpConnection>) -> Result<(), ExecutionResult> {
    let _guard = self.recycle_lock.lock();
    if !connection.is_dropped() {
      return Ok(());
    }
    connection.stop();
    connection.reset();
    connection.init()?;
    connection.run()?;
    Ok(())
  }

  /// Stops every pooled connection, draining their pending callbacks.
  pub fn stop(&self) {
    for pool_key in self.sessions.keys() {
      let Some(entry) = self.sessions.find(&pool_key) else { continue };
      for connection in entry.lock().connections.iter() {
        connection.stop();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn get_connection_rejects_unsupported_scheme() {
    let pool = HttpConnectionPool::new(
      DEFAULT_MAX_CONNECTIONS_PER_HOST,
      Duration::from_secs(1),
      None,
    );
    let result = pool.get_connection("ftp://pbs.example.com");
    assert_eq!(result.unwrap_err().status_code, StatusCode::Http2ClientInvalidUri);
  }

  #[tokio::test]
  async fn fresh_pool_entry_is_not_ready_before_connect_completes() {
    let pool = HttpConnectionPool::new(
      DEFAULT_MAX_CONNECTIONS_PER_HOST,
      Duration::from_millis(50),
      None,
    );
    let result = pool.get_connection("https://pbs.example.invalid:443");
    assert_eq!(
      result.unwrap_err().status_code,
      StatusCode::Http2ClientHttpConnectionNotReady
    );
  }
}
