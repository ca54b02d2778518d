// Copyright 2026 the PBS client authors. MIT license.
//! The request/response pairs `PbsClient`'s three operations exchange via
//! `AsyncContext`, grounded on the `ConsumeBudgetTransactionRequest`/
//! `TransactionPhaseRequest`/`GetTransactionStatusRequest` family used by
//! `cc/pbs/pbs_client/mock/mock_pbs_client.h`.

use pbs_core::Uuid;

use crate::metadata::ConsumeBudgetMetadata;
use crate::phase::TransactionExecutionPhase;

/// Input to `PbsClient::initiate_consume_budget_transaction`: the budget
/// keys this transaction consumes, fanned out to every endpoint
/// `PbsClient` is configured with.
#[derive(Debug, Clone)]
pub struct ConsumeBudgetTransactionRequest {
  pub transaction_id: Uuid,
  pub transaction_secret: String,
  pub budget_keys: Vec<ConsumeBudgetMetadata>,
}

#[derive(Debug, Clone)]
pub struct ConsumeBudgetTransactionResponse {
  /// The highest `last_execution_timestamp` observed across endpoints
  /// after Begin; per-endpoint timestamps are tracked internally and may
  /// differ slightly, so the orchestrator surfaces the watermark.
  pub last_execution_timestamp: i64,
}

/// Input to `PbsClient::execute_transaction_phase`: which phase to drive
/// next, across every endpoint associated with `transaction_id`.
#[derive(Debug, Clone)]
pub struct TransactionPhaseRequest {
  pub transaction_id: Uuid,
  pub phase: TransactionExecutionPhase,
}

#[derive(Debug, Clone)]
pub struct TransactionPhaseResponse {
  pub last_execution_timestamp: i64,
}

/// Input to `PbsClient::get_transaction_status`: a single-endpoint query,
/// not tied to an in-flight transaction the orchestrator is tracking (the
/// caller supplies the endpoint directly, matching spec.md §4.7's
/// description of this as a standalone single-endpoint operation).
#[derive(Debug, Clone)]
pub struct GetTransactionStatusRequest {
  pub transaction_id: Uuid,
  pub transaction_secret: String,
  pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct GetTransactionStatusResponse {
  pub last_execution_timestamp: i64,
  pub has_failures: bool,
  pub is_expired: bool,
}
