// Copyright 2026 the PBS client authors. MIT license.
//! `TransactionExecutionPhase`, grounded on
//! `core::TransactionExecutionPhase` as used throughout
//! `client_consume_budget_command_test.cc`. Legal transitions (spec.md §3):
//!
//! ```text
//! Begin -> Prepare -> Commit -> Notify -> End        (happy path)
//!   any -> Abort -> End                              (failure path)
//! Prepare|Commit|Notify -> (precondition fail) -> reconcile -> retry same phase
//! ```

use std::fmt;

/// One step of the two-phase-commit-plus state machine. `Begin` is
/// dispatched through `ConsumeBudgetCommand::begin`, not
/// `execute_phase` -- it has its own wire endpoint (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionExecutionPhase {
  Begin,
  Prepare,
  Commit,
  Notify,
  Abort,
  End,
  Unknown,
}

impl TransactionExecutionPhase {
  /// The wire token `executePhase` expects in its `phase` field. `Begin`
  /// and `Unknown` have no wire representation -- `Begin` is dispatched
  /// through a different endpoint, and `Unknown` is never sent.
  pub fn wire_name(self) -> Option<&'static str> {
    match self {
      TransactionExecutionPhase::Prepare => Some("PREPARE"),
      TransactionExecutionPhase::Commit => Some("COMMIT"),
      TransactionExecutionPhase::Notify => Some("NOTIFY"),
      TransactionExecutionPhase::Abort => Some("ABORT"),
      TransactionExecutionPhase::End => Some("END"),
      TransactionExecutionPhase::Begin | TransactionExecutionPhase::Unknown => None,
    }
  }
}

impl fmt::Display for TransactionExecutionPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{self:?}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn happy_path_phases_have_wire_names() {
    for phase in [
      TransactionExecutionPhase::Prepare,
      TransactionExecutionPhase::Commit,
      TransactionExecutionPhase::Notify,
      TransactionExecutionPhase::Abort,
      TransactionExecutionPhase::End,
    ] {
      assert!(phase.wire_name().is_some());
    }
  }

  #[test]
  fn begin_and_unknown_have_no_wire_name() {
    assert_eq!(TransactionExecutionPhase::Begin.wire_name(), None);
    assert_eq!(TransactionExecutionPhase::Unknown.wire_name(), None);
  }
}
