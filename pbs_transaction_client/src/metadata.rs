// Copyright 2026 the PBS client authors. MIT license.
//! `ConsumeBudgetMetadata`: the `(budget_key_name, time_bucket)` quantum of
//! privacy budget a transaction consumes, plus the amount consumed.
//! Grounded on `ConsumeBudgetMetadata` referenced throughout
//! `cc/pbs/pbs_client/test/transactional/client_consume_budget_command_test.cc`.

use serde::Deserialize;
use serde::Serialize;

/// One budget key and the token count a transaction consumes from it. A
/// transaction carries an ordered sequence of these (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeBudgetMetadata {
  pub budget_key_name: String,
  pub time_bucket: i64,
  pub token_count: i32,
}

impl ConsumeBudgetMetadata {
  pub fn new(budget_key_name: impl Into<String>, time_bucket: i64, token_count: i32) -> Self {
    ConsumeBudgetMetadata { budget_key_name: budget_key_name.into(), time_bucket, token_count }
  }
}
