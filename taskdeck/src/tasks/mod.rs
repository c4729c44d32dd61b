//! Canonical task set, its projections, and the mutation pipeline.
//!
//! The [`ReconciliationEngine`] owns the set and the optimistic-change log,
//! [`projection`] derives read-only views from it, and [`TaskStore`] runs
//! user actions against the remote API with commit or rollback.

pub mod engine;
pub mod notification;
pub mod orchestrator;
pub mod projection;

pub use engine::{EngineError, HydrateSource, OptimisticOp, ReconciliationEngine};
pub use notification::{MutationAction, Notification};
pub use orchestrator::{MutationError, TaskStore};
pub use projection::{DashboardView, ListParams, TaskListView, TaskRow};
