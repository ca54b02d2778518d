// Copyright 2026 the PBS client authors. MIT license.
//! `AsyncHttpClient` and `SyncHttpClient`, grounded on
//! `cc/core/http2_client/src/synchronous_http2_client.{h,cc}`. The
//! original's `std::promise`/`std::future` pair becomes a fresh
//! `std::sync::mpsc` channel per retry attempt; the original's
//! `RetryStrategy` (not present in the retrieved source) is reconstructed
//! as a small trait with an exponential-backoff default.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use pbs_core::result::failure;
use pbs_core::time::Clock;
use pbs_core::AsyncContext;
use pbs_core::ExecutionResult;
use pbs_core::ExecutionStatus;
use pbs_core::StatusCode;

use crate::http_types::HttpRequest;
use crate::http_types::HttpResponse;
use crate::pool::HttpConnectionPool;

/// Decides how many times, and with what backoff, `SyncHttpClient`
/// retries a `Retry`-classified attempt.
pub trait RetryStrategy: Send + Sync {
  fn max_retry_count(&self) -> u64;
  fn backoff_duration(&self, retry_count: u64) -> Duration;
}

/// Doubling backoff capped at `max_backoff`, with a bounded retry count.
/// The defaults (5 retries, 100ms base, 10s cap) match common PBS client
/// deployment configuration; callers override via `new`.
pub struct ExponentialBackoffRetryStrategy {
  base_backoff: Duration,
  max_backoff: Duration,
  max_retry_count: u64,
}

impl ExponentialBackoffRetryStrategy {
  pub fn new(base_backoff: Duration, max_backoff: Duration, max_retry_count: u64) -> Self {
    ExponentialBackoffRetryStrategy { base_backoff, max_backoff, max_retry_count }
  }
}

impl Default for ExponentialBackoffRetryStrategy {
  fn default() -> Self {
    Self::new(Duration::from_millis(100), Duration::from_secs(10), 5)
  }
}

impl RetryStrategy for ExponentialBackoffRetryStrategy {
  fn max_retry_count(&self) -> u64 {
    self.max_retry_count
  }

  fn backoff_duration(&self, retry_count: u64) -> Duration {
    let exponent = retry_count.saturating_sub(1).min(16) as u32;
    let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    self.base_backoff.checked_mul(multiplier).unwrap_or(self.max_backoff).min(self.max_backoff)
  }
}

/// One-line façade over the connection pool for async callers: look up a
/// connection for the request's path and hand the context to it. No
/// retry behavior lives here; callers that need retries drive
/// `AsyncContext::retry_count`/`finish` themselves or use `SyncHttpClient`.
pub struct AsyncHttpClient {
  pool: Arc<HttpConnectionPool>,
}

impl AsyncHttpClient {
  pub fn new(pool: Arc<HttpConnectionPool>) -> Self {
    AsyncHttpClient { pool }
  }

  pub fn execute(&self, ctx: AsyncContext<HttpRequest, HttpResponse>) -> ExecutionResult {
    match self.pool.get_connection(&ctx.request().path) {
      Ok(connection) => connection.execute(ctx),
      Err(result) => result,
    }
  }
}

/// The outcome of a blocking `SyncHttpClient::perform_request` call.
#[derive(Debug, Clone)]
pub struct SyncHttpClientResponse {
  pub execution_result: ExecutionResult,
  pub http_response: Option<HttpResponse>,
}

/// A blocking façade that retries `Retry`-classified attempts on the
/// calling thread, matching `SyncHttpClient::PerformRequest`/
/// `CheckForRetries`/`TryRequest`.
pub struct SyncHttpClient {
  pool: Arc<HttpConnectionPool>,
  retry_strategy: Box<dyn RetryStrategy>,
  clock: Arc<dyn Clock>,
}

impl SyncHttpClient {
  pub fn new(
    pool: Arc<HttpConnectionPool>,
    retry_strategy: impl RetryStrategy + 'static,
    clock: Arc<dyn Clock>,
  ) -> Self {
    SyncHttpClient { pool, retry_strategy: Box::new(retry_strategy), clock }
  }

  /// Blocks the calling thread until the request resolves to a non-retry
  /// outcome or the retry budget/deadline is exhausted.
  pub fn perform_request(&self, request: HttpRequest) -> SyncHttpClientResponse {
    let response_slot: Arc<Mutex<Option<std::sync::mpsc::Sender<SyncHttpClientResponse>>>> =
      Arc::new(Mutex::new(None));
    let slot_for_callback = Arc::clone(&response_slot);
    let ctx = AsyncContext::new(
      request,
      move |ctx| {
        let response = SyncHttpClientResponse {
          execution_result: ctx.result(),
          http_response: ctx.response().map(|response| (*response).clone()),
        };
        if let Some(sender) = slot_for_callback.lock().take() {
          let _ = sender.send(response);
        }
      },
      self.clock.as_ref(),
    );

    loop {
      if ctx.retry_count() >= self.retry_strategy.max_retry_count() {
        return SyncHttpClientResponse {
          execution_result: failure(StatusCode::DispatcherExhaustedRetries),
          http_response: None,
        };
      }

      let backoff = match self.check_for_retries(&ctx) {
        Ok(backoff) => backoff,
        Err(result) => return SyncHttpClientResponse { execution_result: result, http_response: None },
      };
      std::thread::sleep(backoff);

      let (sender, receiver) = std::sync::mpsc::channel();
      *response_slot.lock() = Some(sender);

      let try_result = self.try_request(&ctx);
      let response = if try_result.successful() {
        receiver.recv().unwrap_or(SyncHttpClientResponse {
          execution_result: failure(StatusCode::Unknown),
          http_response: None,
        })
      } else {
        *response_slot.lock() = None;
        SyncHttpClientResponse { execution_result: try_result, http_response: None }
      };

      if response.execution_result.status == ExecutionStatus::Retry {
        ctx.increment_retry_count();
        continue;
      }
      return response;
    }
  }

  fn try_request(&self, ctx: &AsyncContext<HttpRequest, HttpResponse>) -> ExecutionResult {
    match self.pool.get_connection(&ctx.request().path) {
      Ok(connection) => connection.execute(ctx.clone()),
      Err(result) => result,
    }
  }

  /// Computes the backoff to sleep before the next attempt, or fails the
  /// whole operation if the deadline can't accommodate it. Mirrors
  /// `CheckForRetries` exactly, including its two distinct deadline
  /// failure modes.
  fn check_for_retries(
    &self,
    ctx: &AsyncContext<HttpRequest, HttpResponse>,
  ) -> Result<Duration, ExecutionResult> {
    if ctx.retry_count() == 0 {
      return Ok(Duration::ZERO);
    }

    let backoff = self.retry_strategy.backoff_duration(ctx.retry_count());
    let current_time = self.clock.now_nanos();
    if ctx.expiration_time() <= current_time {
      return Err(failure(StatusCode::DispatcherOperationExpired));
    }

    let backoff_nanos = backoff.as_nanos() as u64;
    if ctx.expiration_time() - current_time <= backoff_nanos {
      return Err(failure(StatusCode::DispatcherNotEnoughTimeRemainedForOperation));
    }

    Ok(backoff)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn exponential_backoff_doubles_until_cap() {
    let strategy =
      ExponentialBackoffRetryStrategy::new(Duration::from_millis(100), Duration::from_secs(1), 10);
    assert_eq!(strategy.backoff_duration(1), Duration::from_millis(100));
    assert_eq!(strategy.backoff_duration(2), Duration::from_millis(200));
    assert_eq!(strategy.backoff_duration(3), Duration::from_millis(400));
    assert_eq!(strategy.backoff_duration(10), Duration::from_secs(1));
  }

  #[test]
  fn default_strategy_allows_five_retries() {
    let strategy = ExponentialBackoffRetryStrategy::default();
    assert_eq!(strategy.max_retry_count(), 5);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn sync_client_fails_fast_when_pool_has_no_connection() {
    let pool = Arc::new(HttpConnectionPool::new(1, Duration::from_millis(20), None));
    let clock: Arc<dyn Clock> = Arc::new(pbs_core::time::SystemClock);
    let strategy = ExponentialBackoffRetryStrategy::new(
      Duration::from_millis(5),
      Duration::from_millis(20),
      3,
    );
    let client = SyncHttpClient::new(pool, strategy, clock);
    let response =
      tokio::task::spawn_blocking(move || {
        client.perform_request(HttpRequest::get("https://pbs.example.invalid:443/v1"))
      })
      .await
      .expect("blocking task should not panic");
    assert_ne!(response.execution_result.status, ExecutionStatus::Success);
  }
}
