// Copyright 2026 the PBS client authors. MIT license.
//! The transactional budget-consumption client: `ConsumeBudgetCommand`
//! drives a single remote endpoint through Begin/Prepare/Commit/Notify/
//! Abort/End, and `PbsClient` fans that out across every endpoint a
//! transaction touches. Grounded on `cc/pbs/pbs_client/src/transactional/`
//! and `PrivacyBudgetServiceClientInterface`
//! (`cc/pbs/pbs_client/mock/mock_pbs_client.h`).

pub mod client;
pub mod command;
pub mod metadata;
pub mod phase;
pub mod types;
pub mod wire;

pub use client::PbsClient;
pub use command::ConsumeBudgetCommand;
pub use metadata::ConsumeBudgetMetadata;
pub use phase::TransactionExecutionPhase;
pub use types::ConsumeBudgetTransactionRequest;
pub use types::ConsumeBudgetTransactionResponse;
pub use types::GetTransactionStatusRequest;
pub use types::GetTransactionStatusResponse;
pub use types::TransactionPhaseRequest;
pub use types::TransactionPhaseResponse;
