// Copyright 2026 the PBS client authors. MIT license.
//! HTTP status code → `ExecutionResult` mapping, grounded on
//! `HttpConnection::ConvertHttpStatusCodeToExecutionResult` in
//! `http_connection.cc`. Only the 5xx family is transport-retryable; 3xx
//! and 4xx are caller errors a retry cannot fix (spec.md §4.3).

use pbs_core::result::failure;
use pbs_core::result::retry;
use pbs_core::result::success;
use pbs_core::ExecutionResult;
use pbs_core::StatusCode;

/// Maps an HTTP status code to the tri-state result spec.md §4.3's table
/// describes. 2xx success codes map to `Success`; 3xx/4xx map to
/// `Failure`; 5xx maps to `Retry`; anything outside those ranges maps to
/// `Failure(Http2ClientHttpRequestResponseStatusUnknown)`.
pub fn status_code_to_execution_result(status_code: u16) -> ExecutionResult {
  match status_code {
    200 | 201 | 202 | 204 | 206 => success(),
    300..=399 => failure(StatusCode::Http2ClientHttpStatusRedirection(status_code)),
    412 => failure(StatusCode::Http2ClientHttpStatusPreconditionFailed),
    400..=416 | 421 | 429 => failure(StatusCode::Http2ClientHttpStatusClientError(status_code)),
    500..=505 => retry(StatusCode::Http2ClientHttpStatusServerError(status_code)),
    _ => failure(StatusCode::Http2ClientHttpRequestResponseStatusUnknown),
  }
}

/// `true` if `status_code` maps to a `Success` result; used by
/// `on_close`'s "transport error wins" rule (spec.md §4.3).
pub fn is_success_status(status_code: u16) -> bool {
  status_code_to_execution_result(status_code).successful()
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use pbs_core::ExecutionStatus;

  #[test]
  fn two_hundred_family_is_success() {
    for code in [200, 201, 202, 204, 206] {
      assert_eq!(status_code_to_execution_result(code).status, ExecutionStatus::Success);
    }
  }

  #[test]
  fn three_hundred_family_is_failure() {
    assert_eq!(
      status_code_to_execution_result(301).status,
      ExecutionStatus::Failure
    );
  }

  #[test]
  fn four_hundred_family_is_failure_except_none() {
    for code in [400, 401, 404, 409, 412, 416, 421, 429] {
      assert_eq!(
        status_code_to_execution_result(code).status,
        ExecutionStatus::Failure,
        "status {code} should be Failure"
      );
    }
  }

  #[test]
  fn precondition_failed_has_its_own_symbol() {
    assert_eq!(
      status_code_to_execution_result(412).status_code,
      StatusCode::Http2ClientHttpStatusPreconditionFailed
    );
  }

  #[test]
  fn five_hundred_family_is_retry() {
    for code in [500, 501, 502, 503, 504, 505] {
      assert_eq!(
        status_code_to_execution_result(code).status,
        ExecutionStatus::Retry,
        "status {code} should be Retry"
      );
    }
  }

  #[test]
  fn unrecognized_code_is_failure_unknown_status() {
    assert_eq!(
      status_code_to_execution_result(999).status_code,
      StatusCode::Http2ClientHttpRequestResponseStatusUnknown
    );
  }
}
