// Copyright 2026 the PBS client authors. MIT license.
//! `ConsumeBudgetCommand`: the per-endpoint transaction phase driver,
//! grounded on
//! `cc/pbs/pbs_client/src/transactional/client_consume_budget_command.{h,cc}`
//! (resolved from the corresponding mock/test in `original_source/`, since
//! the `.cc`/`.h` themselves were not retrieved). Translates a
//! `TransactionExecutionPhase` into the matching wire request, and is the
//! only component that performs the 412-precondition-failed
//! reconciliation of spec.md §4.6.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use http::header::HeaderName;
use http::header::HeaderValue;
use serde::de::DeserializeOwned;
use serde::Serialize;

use pbs_core::bytes_buffer::BytesBuffer;
use pbs_core::collaborators::AuthTokenProviderCache;
use pbs_core::result::failure;
use pbs_core::time::Clock;
use pbs_core::AsyncContext;
use pbs_core::ExecutionResult;
use pbs_core::ExecutionResultOr;
use pbs_core::ExecutionStatus;
use pbs_core::StatusCode;
use pbs_core::Uuid;
use pbs_http2_client::AsyncHttpClient;
use pbs_http2_client::HttpRequest;
use pbs_http2_client::HttpResponse;

use crate::metadata::ConsumeBudgetMetadata;
use crate::phase::TransactionExecutionPhase;
use crate::wire::BeginBudgetConsumptionRequestBody;
use crate::wire::BeginBudgetConsumptionResponseBody;
use crate::wire::ExecutePhaseRequestBody;
use crate::wire::ExecutePhaseResponseBody;
use crate::wire::GetTransactionStatusRequestBody;
use crate::wire::GetTransactionStatusResponseBody;
use crate::wire::BEGIN_BUDGET_CONSUMPTION_PATH;
use crate::wire::EXECUTE_PHASE_PATH;
use crate::wire::GET_STATUS_PATH;

const X_GSCP_CLAIMED_IDENTITY: &str = "x-gscp-claimed-identity";

/// Drives the Begin/Prepare/Commit/Notify/Abort/End phases of a single
/// budget-consumption transaction against one remote endpoint.
/// `last_execution_timestamp` is the remote's monotonic freshness token,
/// threaded through every phase call after `begin` populates it.
pub struct ConsumeBudgetCommand {
  transaction_id: Uuid,
  transaction_secret: String,
  budget_keys: Vec<ConsumeBudgetMetadata>,
  endpoint: String,
  claimed_identity: String,
  http_client: Arc<AsyncHttpClient>,
  clock: Arc<dyn Clock>,
  auth_token_provider: Option<Arc<dyn AuthTokenProviderCache>>,
  last_execution_timestamp: AtomicI64,
}

impl ConsumeBudgetCommand {
  pub fn new(
    transaction_id: Uuid,
    transaction_secret: impl Into<String>,
    budget_keys: Vec<ConsumeBudgetMetadata>,
    endpoint: impl Into<String>,
    claimed_identity: impl Into<String>,
    http_client: Arc<AsyncHttpClient>,
    clock: Arc<dyn Clock>,
    auth_token_provider: Option<Arc<dyn AuthTokenProviderCache>>,
  ) -> Self {
    ConsumeBudgetCommand {
      transaction_id,
      transaction_secret: transaction_secret.into(),
      budget_keys,
      endpoint: endpoint.into(),
      claimed_identity: claimed_identity.into(),
      http_client,
      clock,
      auth_token_provider,
      last_execution_timestamp: AtomicI64::new(0),
    }
  }

  pub fn transaction_id(&self) -> Uuid {
    self.transaction_id
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  pub fn last_execution_timestamp(&self) -> i64 {
    self.last_execution_timestamp.load(Ordering::SeqCst)
  }

  /// `POST /v1/transactions:beginBudgetConsumption`. On success, stores
  /// the remote's initial `last_execution_timestamp`.
  pub async fn begin(&self) -> ExecutionResult {
    let body = BeginBudgetConsumptionRequestBody {
      transaction_id: self.transaction_id.to_string(),
      transaction_secret: self.transaction_secret.clone(),
      budget_keys: self.budget_keys.clone(),
    };
    let request = match self.build_request(BEGIN_BUDGET_CONSUMPTION_PATH, body).await {
      Ok(request) => request,
      Err(result) => return result,
    };
    let (result, response) = self.perform(request).await;
    if result.successful() {
      if let Some(response) = &response {
        if let Ok(body) = parse_response::<BeginBudgetConsumptionResponseBody>(response) {
          self.last_execution_timestamp.store(body.last_execution_timestamp, Ordering::SeqCst);
        }
      }
    }
    result
  }

  /// `POST /v1/transactions:executePhase` for any phase except `Begin`.
  /// On `Failure(Http2ClientHttpStatusPreconditionFailed)`, performs the
  /// one free resync spec.md §4.6 describes: fetches the remote's current
  /// status, overwrites `last_execution_timestamp`, and re-issues the
  /// same phase exactly once more before giving up.
  pub async fn execute_phase(&self, phase: TransactionExecutionPhase) -> ExecutionResult {
    let Some(wire_phase) = phase.wire_name() else {
      return failure(StatusCode::TransactionPhaseFailed);
    };

    let mut already_reconciled = false;
    loop {
      let body = ExecutePhaseRequestBody {
        transaction_id: self.transaction_id.to_string(),
        transaction_secret: self.transaction_secret.clone(),
        phase: wire_phase.to_string(),
        last_execution_timestamp: self.last_execution_timestamp(),
      };
      let request = match self.build_request(EXECUTE_PHASE_PATH, body).await {
        Ok(request) => request,
        Err(result) => return result,
      };
      let (result, response) = self.perform(request).await;

      match result.status {
        ExecutionStatus::Success => {
          if let Some(response) = &response {
            if let Ok(body) = parse_response::<ExecutePhaseResponseBody>(response) {
              self.last_execution_timestamp.store(body.last_execution_timestamp, Ordering::SeqCst);
            }
          }
          return result;
        }
        ExecutionStatus::Retry => return result,
        ExecutionStatus::Failure => {
          let is_precondition_failed =
            result.status_code == StatusCode::Http2ClientHttpStatusPreconditionFailed;
          if already_reconciled || !is_precondition_failed {
            return result;
          }
          match self.get_transaction_status().await {
            Ok(status) => {
              self.last_execution_timestamp.store(status.last_execution_timestamp, Ordering::SeqCst);
              already_reconciled = true;
              continue;
            }
            Err(status_result) => return status_result,
          }
        }
      }
    }
  }

  /// `POST /v1/transactions:getStatus`, used both by external callers and
  /// by this command's own 412 reconciliation.
  pub async fn get_transaction_status(
    &self,
  ) -> ExecutionResultOr<GetTransactionStatusResponseBody> {
    let body = GetTransactionStatusRequestBody {
      transaction_id: self.transaction_id.to_string(),
      transaction_secret: self.transaction_secret.clone(),
    };
    let request = self.build_request(GET_STATUS_PATH, body).await?;
    let (result, response) = self.perform(request).await;
    if !result.successful() {
      return Err(result);
    }
    let response = response.ok_or_else(|| failure(StatusCode::Unknown))?;
    parse_response(&response)
  }

  async fn build_request(
    &self,
    path: &str,
    body: impl Serialize,
  ) -> ExecutionResultOr<HttpRequest> {
    let body_bytes = serde_json::to_vec(&body).map_err(|_| failure(StatusCode::JsonParseError))?;
    let mut request =
      HttpRequest::post(format!("{}{path}", self.endpoint), BytesBuffer::from_vec(body_bytes));
    request.headers.insert(
      HeaderName::from_static(X_GSCP_CLAIMED_IDENTITY),
      HeaderValue::from_str(&self.claimed_identity).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    request
      .headers
      .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(provider) = &self.auth_token_provider {
      let token = provider.get_token().await?;
      if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
        request.headers.insert(http::header::AUTHORIZATION, value);
      }
    }

    Ok(request)
  }

  async fn perform(&self, request: HttpRequest) -> (ExecutionResult, Option<HttpResponse>) {
    let (sender, receiver) = tokio::sync::oneshot::channel();
    let sender = parking_lot_mutex(sender);
    let ctx: AsyncContext<HttpRequest, HttpResponse> = AsyncContext::new(
      request,
      move |ctx| {
        if let Some(sender) = sender.lock().take() {
          let _ = sender.send((ctx.result(), ctx.response()));
        }
      },
      self.clock.as_ref(),
    );

    let submit_result = self.http_client.execute(ctx);
    if submit_result.status != ExecutionStatus::Success {
      // The request was never accepted for dispatch -- no callback was
      // (or ever will be) invoked, so the submit outcome IS the result.
      return (submit_result, None);
    }

    match receiver.await {
      Ok((result, response)) => (result, response.map(|response| (*response).clone())),
      Err(_) => (failure(StatusCode::Unknown), None),
    }
  }
}

fn parking_lot_mutex<T>(value: T) -> parking_lot::Mutex<Option<T>> {
  parking_lot::Mutex::new(Some(value))
}

fn parse_response<T: DeserializeOwned>(response: &HttpResponse) -> ExecutionResultOr<T> {
  serde_json::from_slice(response.body.as_slice()).map_err(|_| failure(StatusCode::JsonParseError))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use pbs_http2_client::HttpConnectionPool;
  use std::time::Duration;

  #[test]
  fn fresh_command_has_zero_last_execution_timestamp() {
    let pool = Arc::new(HttpConnectionPool::new(1, Duration::from_secs(1), None));
    let http_client = Arc::new(AsyncHttpClient::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(pbs_core::time::SystemClock);
    let command = ConsumeBudgetCommand::new(
      Uuid::generate(),
      "secret",
      vec![ConsumeBudgetMetadata::new("bk1", 1000, 1)],
      "https://pbs.example.invalid",
      "tenant",
      http_client,
      clock,
      None,
    );
    assert_eq!(command.last_execution_timestamp(), 0);
  }

  #[test]
  fn unknown_phase_fails_without_dispatching() {
    // wire_name() being None for Begin/Unknown is covered directly in
    // phase.rs; this just documents execute_phase's short-circuit.
    assert_eq!(TransactionExecutionPhase::Unknown.wire_name(), None);
  }
}
