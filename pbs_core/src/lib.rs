// Copyright 2026 the PBS client authors. MIT license.
//! Base types shared by every crate in the workspace: the tri-state
//! `ExecutionResult`/`StatusCode` taxonomy, the `AsyncContext` envelope,
//! `Uuid`, `ConcurrentMap`, time abstractions, `PeriodicClosure`,
//! `BytesBuffer`, base64 helpers, environment-variable configuration, and
//! the narrow collaborator traits the core consumes but does not
//! implement (spec.md §6).

pub mod async_context;
pub mod base64;
pub mod bytes_buffer;
pub mod collaborators;
pub mod concurrent_map;
pub mod config;
pub mod periodic_closure;
pub mod result;
pub mod time;
pub mod uuid;

pub use async_context::AsyncContext;
pub use async_context::AsyncExecutor;
pub use async_context::AsyncPriority;
pub use bytes_buffer::BytesBuffer;
pub use concurrent_map::ConcurrentMap;
pub use result::ExecutionResult;
pub use result::ExecutionResultOr;
pub use result::ExecutionStatus;
pub use result::StatusCode;
pub use time::Clock;
pub use time::Timestamp;
pub use uuid::Uuid;
pub use uuid::ZERO_UUID;
