// Copyright 2026 the PBS client authors. MIT license.
//! JSON wire bodies for the three endpoints spec.md §6 lists. These are
//! the exact fields `beginBudgetConsumption`/`executePhase`/`getStatus`
//! accept and return; `ConsumeBudgetCommand` is the only caller.

use serde::Deserialize;
use serde::Serialize;

use crate::metadata::ConsumeBudgetMetadata;

#[derive(Debug, Clone, Serialize)]
pub struct BeginBudgetConsumptionRequestBody {
  pub transaction_id: String,
  pub transaction_secret: String,
  pub budget_keys: Vec<ConsumeBudgetMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeginBudgetConsumptionResponseBody {
  pub last_execution_timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutePhaseRequestBody {
  pub transaction_id: String,
  pub transaction_secret: String,
  pub phase: String,
  pub last_execution_timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutePhaseResponseBody {
  pub last_execution_timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetTransactionStatusRequestBody {
  pub transaction_id: String,
  pub transaction_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetTransactionStatusResponseBody {
  pub last_execution_timestamp: i64,
  pub has_failures: bool,
  pub is_expired: bool,
}

pub const BEGIN_BUDGET_CONSUMPTION_PATH: &str = "/v1/transactions:beginBudgetConsumption";
pub const EXECUTE_PHASE_PATH: &str = "/v1/transactions:executePhase";
pub const GET_STATUS_PATH: &str = "/v1/transactions:getStatus";
