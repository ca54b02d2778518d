// Copyright 2026 the PBS client authors. MIT license.
//! The generic request/response envelope that carries activity identifiers,
//! result codes, expiration deadlines, retry counters and a completion
//! callback through every asynchronous boundary. Grounded on
//! `cc/core/interface/async_context.h`.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::result;
use crate::result::ExecutionResult;
use crate::time::Clock;
use crate::time::Timestamp;
use crate::uuid::Uuid;
use crate::uuid::ZERO_UUID;

/// The default deadline given to a freshly-constructed `AsyncContext`.
pub const ASYNC_CONTEXT_EXPIRATION_DURATION: Duration = Duration::from_secs(30);

/// Priority hint passed to `finish_context_async`'s executor, mirroring
/// `AsyncPriority` in the original interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncPriority {
  High,
  Normal,
}

type Callback<Req, Resp> = Arc<dyn Fn(&AsyncContext<Req, Resp>) + Send + Sync>;

struct Inner<Req, Resp> {
  parent_activity_id: Uuid,
  activity_id: Uuid,
  correlation_id: Uuid,
  request: Arc<Req>,
  response: Mutex<Option<Arc<Resp>>>,
  result: Mutex<ExecutionResult>,
  callback: Callback<Req, Resp>,
  retry_count: AtomicU64,
  expiration_time: Timestamp,
}

/// `AsyncContext<Req, Resp>` is used to control the lifecycle of any async
/// operation. Cloning shares the same underlying state (it is a thin
/// `Arc` handle): the copy handed to a spawned task and the copy held by
/// the caller are the same logical context, per spec.md §3's "AsyncContexts
/// are value-copied into callbacks; ownership of request/response is
/// shared".
pub struct AsyncContext<Req, Resp> {
  inner: Arc<Inner<Req, Resp>>,
}

impl<Req, Resp> Clone for AsyncContext<Req, Resp> {
  fn clone(&self) -> Self {
    AsyncContext { inner: Arc::clone(&self.inner) }
  }
}

impl<Req, Resp> AsyncContext<Req, Resp> {
  /// Constructs a new context with no parent.
  pub fn new(
    request: Req,
    callback: impl Fn(&AsyncContext<Req, Resp>) + Send + Sync + 'static,
    clock: &dyn Clock,
  ) -> Self {
    Self::with_parent(request, callback, ZERO_UUID, ZERO_UUID, clock)
  }

  /// Constructs a new context inheriting `parent_activity_id` only.
  pub fn with_parent_activity_id(
    request: Req,
    callback: impl Fn(&AsyncContext<Req, Resp>) + Send + Sync + 'static,
    parent_activity_id: Uuid,
    clock: &dyn Clock,
  ) -> Self {
    Self::with_parent(request, callback, parent_activity_id, ZERO_UUID, clock)
  }

  /// Constructs a new context chained from a parent context: inherits the
  /// parent's `correlation_id` and sets `parent_activity_id` to the
  /// parent's `activity_id`.
  pub fn chained<ParentReq, ParentResp>(
    request: Req,
    callback: impl Fn(&AsyncContext<Req, Resp>) + Send + Sync + 'static,
    parent: &AsyncContext<ParentReq, ParentResp>,
    clock: &dyn Clock,
  ) -> Self {
    Self::with_parent(
      request,
      callback,
      parent.activity_id(),
      parent.correlation_id(),
      clock,
    )
  }

  fn with_parent(
    request: Req,
    callback: impl Fn(&AsyncContext<Req, Resp>) + Send + Sync + 'static,
    parent_activity_id: Uuid,
    correlation_id: Uuid,
    clock: &dyn Clock,
  ) -> Self {
    let expiration_time =
      clock.now_nanos() + ASYNC_CONTEXT_EXPIRATION_DURATION.as_nanos() as u64;
    AsyncContext {
      inner: Arc::new(Inner {
        parent_activity_id,
        activity_id: Uuid::generate(),
        correlation_id,
        request: Arc::new(request),
        response: Mutex::new(None),
        result: Mutex::new(result::failure(crate::result::StatusCode::Unknown)),
        callback: Arc::new(callback),
        retry_count: AtomicU64::new(0),
        expiration_time,
      }),
    }
  }

  pub fn parent_activity_id(&self) -> Uuid {
    self.inner.parent_activity_id
  }

  pub fn activity_id(&self) -> Uuid {
    self.inner.activity_id
  }

  pub fn correlation_id(&self) -> Uuid {
    self.inner.correlation_id
  }

  pub fn request(&self) -> &Arc<Req> {
    &self.inner.request
  }

  pub fn response(&self) -> Option<Arc<Resp>> {
    self.inner.response.lock().clone()
  }

  /// Populates the response. Must be called by the callee before
  /// `finish()` on success.
  pub fn set_response(&self, response: Resp) {
    *self.inner.response.lock() = Some(Arc::new(response));
  }

  pub fn result(&self) -> ExecutionResult {
    *self.inner.result.lock()
  }

  pub fn set_result(&self, result: ExecutionResult) {
    *self.inner.result.lock() = result;
  }

  pub fn retry_count(&self) -> u64 {
    self.inner.retry_count.load(Ordering::SeqCst)
  }

  /// Advances the retry counter. Only the retry driver (`SyncHttpClient`'s
  /// loop) should call this, after observing a `Retry` result.
  pub fn increment_retry_count(&self) -> u64 {
    self.inner.retry_count.fetch_add(1, Ordering::SeqCst) + 1
  }

  pub fn expiration_time(&self) -> Timestamp {
    self.inner.expiration_time
  }

  pub fn is_expired(&self, clock: &dyn Clock) -> bool {
    clock.now_nanos() >= self.inner.expiration_time
  }

  /// Finishes the async operation by invoking the callback. Logs on
  /// failure (including the identifiers needed to correlate across
  /// layers) before doing so. Callers are responsible for calling this
  /// exactly once per dispatched context, on success or failure, after
  /// `result` has been assigned.
  pub fn finish(&self) {
    let result = self.result();
    if !result.successful() {
      tracing::error!(
        activity_id = %self.activity_id(),
        correlation_id = %self.correlation_id(),
        parent_activity_id = %self.parent_activity_id(),
        status = ?result.status,
        status_code = %result.status_code,
        "AsyncContext finished unsuccessfully"
      );
    }
    (self.inner.callback)(self);
  }
}

impl<Req, Resp> fmt::Debug for AsyncContext<Req, Resp> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AsyncContext")
      .field("activity_id", &self.activity_id())
      .field("correlation_id", &self.correlation_id())
      .field("result", &self.result())
      .field("retry_count", &self.retry_count())
      .finish()
  }
}

/// A minimal executor abstraction: anything that can run a finish task
/// asynchronously (a `tokio::runtime::Handle` implements this directly via
/// the blanket impl below).
pub trait AsyncExecutor {
  fn try_spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) -> Result<(), ()>;
}

impl AsyncExecutor for tokio::runtime::Handle {
  fn try_spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) -> Result<(), ()> {
    self.spawn_blocking(task);
    Ok(())
  }
}

/// Assigns `result` to the context, then schedules `finish()` on the
/// caller-supplied executor at the given priority. Falls back to a
/// synchronous finish if scheduling fails. A clone of the context is
/// captured by the scheduled task so its lifetime is guaranteed -- the
/// nghttp2-equivalent IO task may outlive the caller's stack frame.
pub fn finish_context_async<Req, Resp>(
  result: ExecutionResult,
  context: &AsyncContext<Req, Resp>,
  executor: &dyn AsyncExecutor,
  _priority: AsyncPriority,
) where
  Req: Send + Sync + 'static,
  Resp: Send + Sync + 'static,
{
  context.set_result(result);
  let captured = context.clone();
  if executor
    .try_spawn(Box::new(move || captured.finish()))
    .is_err()
  {
    context.finish();
  }
}

/// Assigns `result` to the context and calls `finish()` on the current
/// thread.
pub fn finish_context<Req, Resp>(
  result: ExecutionResult,
  context: &AsyncContext<Req, Resp>,
) {
  context.set_result(result);
  context.finish();
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use crate::result::StatusCode;
  use crate::time::SystemClock;
  use std::sync::atomic::AtomicUsize;

  #[test]
  fn callback_invoked_exactly_once_on_finish() {
    let clock = SystemClock;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let ctx: AsyncContext<i32, i32> =
      AsyncContext::new(1, move |_ctx| { calls_clone.fetch_add(1, Ordering::SeqCst); }, &clock);
    finish_context(result::success(), &ctx);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn chained_context_inherits_correlation_id() {
    let clock = SystemClock;
    let parent: AsyncContext<i32, i32> =
      AsyncContext::new(1, |_| {}, &clock);
    finish_context(result::success(), &parent);
    let child: AsyncContext<i32, i32> =
      AsyncContext::chained(2, |_| {}, &parent, &clock);
    assert_eq!(child.correlation_id(), parent.correlation_id());
    assert_eq!(child.parent_activity_id(), parent.activity_id());
  }

  #[test]
  fn default_expiration_is_in_the_future() {
    let clock = SystemClock;
    let ctx: AsyncContext<i32, i32> = AsyncContext::new(1, |_| {}, &clock);
    assert!(!ctx.is_expired(&clock));
    assert!(ctx.expiration_time() > clock.now_nanos());
  }

  #[test]
  fn initial_result_is_failure_unknown() {
    let clock = SystemClock;
    let ctx: AsyncContext<i32, i32> = AsyncContext::new(1, |_| {}, &clock);
    let result = ctx.result();
    assert_eq!(result.status, crate::result::ExecutionStatus::Failure);
    assert_eq!(result.status_code, StatusCode::Unknown);
  }
}
