// Copyright 2026 the PBS client authors. MIT license.
//! `PbsClient`: the orchestrator that fans `InitiateConsumeBudgetTransaction`/
//! `ExecuteTransactionPhase`/`GetTransactionStatus` out across every
//! configured endpoint and combines their `ExecutionResult`s, grounded on
//! `PrivacyBudgetServiceClientInterface` in
//! `cc/pbs/pbs_client/mock/mock_pbs_client.h`. One endpoint corresponds to
//! one remote PBS partition; a transaction that spans N partitions needs
//! every partition to agree at each phase, which is exactly what
//! `worst_of` over the per-endpoint results gives us.

use std::sync::Arc;

use pbs_core::collaborators::AuthTokenProviderCache;
use pbs_core::result::failure;
use pbs_core::result::success;
use pbs_core::result::worst_of;
use pbs_core::time::Clock;
use pbs_core::AsyncContext;
use pbs_core::ConcurrentMap;
use pbs_core::ExecutionResult;
use pbs_core::StatusCode;
use pbs_core::Uuid;
use pbs_http2_client::AsyncHttpClient;

use crate::command::ConsumeBudgetCommand;
use crate::phase::TransactionExecutionPhase;
use crate::types::ConsumeBudgetTransactionRequest;
use crate::types::ConsumeBudgetTransactionResponse;
use crate::types::GetTransactionStatusRequest;
use crate::types::GetTransactionStatusResponse;
use crate::types::TransactionPhaseRequest;
use crate::types::TransactionPhaseResponse;

/// Fans a transaction out across every configured endpoint, one
/// `ConsumeBudgetCommand` per endpoint, and combines their results with
/// `worst_of`: a transaction only reads as `Success` once every partition
/// agrees. Tracks in-flight transactions' per-endpoint commands in memory
/// only -- this is dispatcher bookkeeping, not durable state; durability
/// lives on the remote partitions (spec.md §2's stateless-dispatcher
/// framing).
pub struct PbsClient {
  endpoints: Vec<String>,
  claimed_identity: String,
  http_client: Arc<AsyncHttpClient>,
  clock: Arc<dyn Clock>,
  auth_token_provider: Option<Arc<dyn AuthTokenProviderCache>>,
  transactions: ConcurrentMap<Uuid, Arc<Vec<Arc<ConsumeBudgetCommand>>>>,
}

impl PbsClient {
  pub fn new(
    endpoints: Vec<String>,
    claimed_identity: impl Into<String>,
    http_client: Arc<AsyncHttpClient>,
    clock: Arc<dyn Clock>,
    auth_token_provider: Option<Arc<dyn AuthTokenProviderCache>>,
  ) -> Self {
    PbsClient {
      endpoints,
      claimed_identity: claimed_identity.into(),
      http_client,
      clock,
      auth_token_provider,
      transactions: ConcurrentMap::new(),
    }
  }

  pub fn endpoints(&self) -> &[String] {
    &self.endpoints
  }

  /// Begins a transaction across every configured endpoint. If any
  /// endpoint fails Begin, issues Abort to the endpoints that did
  /// succeed and does not register the transaction -- there is nothing
  /// for a later `execute_transaction_phase` call to drive. Callers
  /// decide when to advance the transaction to `Prepare`; this does not
  /// chain into it automatically.
  pub async fn initiate_consume_budget_transaction(
    &self,
    ctx: &AsyncContext<ConsumeBudgetTransactionRequest, ConsumeBudgetTransactionResponse>,
  ) -> ExecutionResult {
    let request = Arc::clone(ctx.request());
    let commands: Vec<Arc<ConsumeBudgetCommand>> = self
      .endpoints
      .iter()
      .map(|endpoint| {
        Arc::new(ConsumeBudgetCommand::new(
          request.transaction_id,
          request.transaction_secret.clone(),
          request.budget_keys.clone(),
          endpoint.clone(),
          self.claimed_identity.clone(),
          Arc::clone(&self.http_client),
          Arc::clone(&self.clock),
          self.auth_token_provider.clone(),
        ))
      })
      .collect();

    let results = fan_out(&commands, |command| async move { command.begin().await }).await;
    let overall = results.iter().copied().fold(success(), worst_of);

    if overall.successful() {
      self.transactions.insert(request.transaction_id, Arc::new(commands.clone()));
    } else {
      let begun: Vec<Arc<ConsumeBudgetCommand>> = commands
        .iter()
        .zip(results.iter())
        .filter(|(_, result)| result.successful())
        .map(|(command, _)| Arc::clone(command))
        .collect();
      tracing::warn!(
        transaction_id = %request.transaction_id,
        endpoints_begun = begun.len(),
        endpoints_total = commands.len(),
        "Begin failed on at least one endpoint; aborting the endpoints that succeeded"
      );
      fan_out(&begun, |command| async move {
        command.execute_phase(TransactionExecutionPhase::Abort).await
      })
      .await;
    }

    let last_execution_timestamp =
      commands.iter().map(|command| command.last_execution_timestamp()).max().unwrap_or(0);
    ctx.set_response(ConsumeBudgetTransactionResponse { last_execution_timestamp });
    pbs_core::async_context::finish_context(overall, ctx);
    overall
  }

  /// Drives every endpoint associated with `transaction_id` through one
  /// phase and combines the results. Fails with `TransactionPhaseFailed`
  /// if the transaction isn't one this client began.
  pub async fn execute_transaction_phase(
    &self,
    ctx: &AsyncContext<TransactionPhaseRequest, TransactionPhaseResponse>,
  ) -> ExecutionResult {
    let request = Arc::clone(ctx.request());
    let Some(commands) = self.transactions.find(&request.transaction_id) else {
      let result = failure(StatusCode::TransactionPhaseFailed);
      pbs_core::async_context::finish_context(result, ctx);
      return result;
    };

    let phase = request.phase;
    let results =
      fan_out(&commands, move |command| async move { command.execute_phase(phase).await }).await;
    let overall = results.iter().copied().fold(success(), worst_of);

    let last_execution_timestamp =
      commands.iter().map(|command| command.last_execution_timestamp()).max().unwrap_or(0);

    if matches!(phase, TransactionExecutionPhase::End | TransactionExecutionPhase::Abort) {
      self.transactions.erase(&request.transaction_id);
    }

    ctx.set_response(TransactionPhaseResponse { last_execution_timestamp });
    pbs_core::async_context::finish_context(overall, ctx);
    overall
  }

  /// Queries a single endpoint directly; unlike the other two operations
  /// this does not consult `self.transactions`, since a caller may ask
  /// about a transaction this process never initiated.
  pub async fn get_transaction_status(
    &self,
    ctx: &AsyncContext<GetTransactionStatusRequest, GetTransactionStatusResponse>,
  ) -> ExecutionResult {
    let request = Arc::clone(ctx.request());
    let command = ConsumeBudgetCommand::new(
      request.transaction_id,
      request.transaction_secret.clone(),
      Vec::new(),
      request.endpoint.clone(),
      self.claimed_identity.clone(),
      Arc::clone(&self.http_client),
      Arc::clone(&self.clock),
      self.auth_token_provider.clone(),
    );

    let result = match command.get_transaction_status().await {
      Ok(status) => {
        ctx.set_response(GetTransactionStatusResponse {
          last_execution_timestamp: status.last_execution_timestamp,
          has_failures: status.has_failures,
          is_expired: status.is_expired,
        });
        success()
      }
      Err(result) => result,
    };
    pbs_core::async_context::finish_context(result, ctx);
    result
  }
}

/// Runs `op` against every command concurrently (one `tokio` task per
/// endpoint) and waits for all of them, preserving input order. A task
/// that panics is reported as `Unknown` rather than propagating the
/// panic, so one misbehaving endpoint doesn't take down the whole
/// fan-out.
async fn fan_out<F, Fut>(commands: &[Arc<ConsumeBudgetCommand>], op: F) -> Vec<ExecutionResult>
where
  F: Fn(Arc<ConsumeBudgetCommand>) -> Fut,
  Fut: std::future::Future<Output = ExecutionResult> + Send + 'static,
{
  let handles: Vec<_> =
    commands.iter().cloned().map(|command| tokio::spawn(op(command))).collect();
  let mut results = Vec::with_capacity(handles.len());
  for handle in handles {
    results.push(handle.await.unwrap_or_else(|_| failure(StatusCode::Unknown)));
  }
  results
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use crate::metadata::ConsumeBudgetMetadata;
  use pbs_http2_client::HttpConnectionPool;
  use std::time::Duration;

  fn make_client(endpoints: Vec<String>) -> PbsClient {
    let pool = Arc::new(HttpConnectionPool::new(4, Duration::from_secs(1), None));
    let http_client = Arc::new(AsyncHttpClient::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(pbs_core::time::SystemClock);
    PbsClient::new(endpoints, "tenant", http_client, clock, None)
  }

  #[test]
  fn endpoints_are_preserved_in_order() {
    let client = make_client(vec!["https://a.invalid".to_string(), "https://b.invalid".to_string()]);
    assert_eq!(client.endpoints(), &["https://a.invalid".to_string(), "https://b.invalid".to_string()]);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn phase_on_unknown_transaction_fails_without_dispatching() {
    let client = make_client(vec!["https://pbs.example.invalid".to_string()]);
    let clock = pbs_core::time::SystemClock;
    let ctx: AsyncContext<TransactionPhaseRequest, TransactionPhaseResponse> = AsyncContext::new(
      TransactionPhaseRequest { transaction_id: Uuid::generate(), phase: TransactionExecutionPhase::Prepare },
      |_ctx| {},
      &clock,
    );
    let result = client.execute_transaction_phase(&ctx).await;
    assert_eq!(result.status_code, StatusCode::TransactionPhaseFailed);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn initiate_against_unreachable_endpoints_does_not_register_transaction() {
    let client = make_client(vec!["https://pbs-a.example.invalid".to_string(), "https://pbs-b.example.invalid".to_string()]);
    let clock = pbs_core::time::SystemClock;
    let transaction_id = Uuid::generate();
    let ctx: AsyncContext<ConsumeBudgetTransactionRequest, ConsumeBudgetTransactionResponse> =
      AsyncContext::new(
        ConsumeBudgetTransactionRequest {
          transaction_id,
          transaction_secret: "secret".to_string(),
          budget_keys: vec![ConsumeBudgetMetadata::new("bk1", 1000, 1)],
        },
        |_ctx| {},
        &clock,
      );
    let result = client.initiate_consume_budget_transaction(&ctx).await;
    assert!(!result.successful());
    assert!(client.transactions.find(&transaction_id).is_none());
  }
}
