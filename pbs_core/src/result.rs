// Copyright 2026 the PBS client authors. MIT license.
//! The tri-state execution result, mirroring
//! `cc/public/core/interface/execution_result.h`.

use std::fmt;

/// Operation's execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
  /// Executed successfully.
  Success,
  /// Execution failed; the caller should not retry as-is.
  Failure,
  /// Did not execute and requires retry.
  Retry,
}

/// The flat status-code taxonomy. Mirrors the `SC_*` symbols of the
/// original C++ implementation verbatim; see spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StatusCode {
  Ok,
  Unknown,

  // Transport errors -- always Retry.
  Http2ClientConnectionDropped,
  Http2ClientFailedToIssueHttpRequest,
  Http2ClientNoConnectionEstablished,
  Http2ClientHttpConnectionNotReady,
  Http2ClientHttpRequestCloseError,

  // Protocol errors -- always Failure.
  Http2ClientHttpMethodNotSupported,
  Http2ClientInvalidUri,
  Http2ClientTlsCtxError,

  // HTTP status errors, one per status code family.
  Http2ClientHttpStatusRedirection(u16),
  Http2ClientHttpStatusClientError(u16),
  Http2ClientHttpStatusPreconditionFailed,
  Http2ClientHttpStatusServerError(u16),
  Http2ClientHttpRequestResponseStatusUnknown,

  // Dispatcher errors -- always Failure.
  DispatcherOperationExpired,
  DispatcherNotEnoughTimeRemainedForOperation,
  DispatcherExhaustedRetries,

  // Parse errors -- always Failure.
  UuidInvalidString,
  CoreUtilsCurlInitError,
  CoreUtilsInvalidBase64EncodingLength,
  CoreUtilsInvalidInput,
  JsonParseError,

  // Transaction-level errors -- always Failure unless noted.
  TransactionPhaseFailed,
  TransactionCommandOrchestratorPartialFailure,
}

impl fmt::Display for StatusCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{self:?}")
  }
}

/// Operation's execution result including status and status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionResult {
  pub status: ExecutionStatus,
  pub status_code: StatusCode,
}

impl ExecutionResult {
  pub const fn new(status: ExecutionStatus, status_code: StatusCode) -> Self {
    ExecutionResult { status, status_code }
  }

  pub fn successful(&self) -> bool {
    self.status == ExecutionStatus::Success
  }
}

impl fmt::Display for ExecutionResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}({})", self.status, self.status_code)
  }
}

/// An `ExecutionResult` with `Success` status.
pub fn success() -> ExecutionResult {
  ExecutionResult::new(ExecutionStatus::Success, StatusCode::Ok)
}

/// An `ExecutionResult` with `Failure` status.
pub fn failure(status_code: StatusCode) -> ExecutionResult {
  ExecutionResult::new(ExecutionStatus::Failure, status_code)
}

/// An `ExecutionResult` with `Retry` status.
pub fn retry(status_code: StatusCode) -> ExecutionResult {
  ExecutionResult::new(ExecutionStatus::Retry, status_code)
}

/// Wrapper type for a fallible operation that returns either an
/// `ExecutionResult` (on failure/retry) or a value (on success), mirroring
/// `ExecutionResultOr<T>`.
pub type ExecutionResultOr<T> = Result<T, ExecutionResult>;

/// Promotes the worst of two results: `Failure` beats `Retry` beats
/// `Success`. Used by the fan-out orchestrator (spec.md §4.7/§9) to combine
/// per-endpoint results without losing a `Failure` to a later `Success`.
pub fn worst_of(a: ExecutionResult, b: ExecutionResult) -> ExecutionResult {
  use ExecutionStatus::*;
  match (a.status, b.status) {
    (Failure, _) => a,
    (_, Failure) => b,
    (Retry, _) => a,
    (_, Retry) => b,
    (Success, Success) => a,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn worst_of_prefers_failure_over_retry_and_success() {
    let f = failure(StatusCode::Unknown);
    let r = retry(StatusCode::Http2ClientConnectionDropped);
    let s = success();
    assert_eq!(worst_of(s, f).status, ExecutionStatus::Failure);
    assert_eq!(worst_of(f, r).status, ExecutionStatus::Failure);
    assert_eq!(worst_of(r, s).status, ExecutionStatus::Retry);
    assert_eq!(worst_of(s, s).status, ExecutionStatus::Success);
  }
}
