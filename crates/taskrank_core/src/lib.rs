//! Core domain logic for taskrank.
//! This crate is the single source of truth for priority ranking invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::task::{OwnerId, Task, TaskId, TaskValidationError};
pub use repo::task_repo::{
    RepoError, RepoResult, SqliteTaskStore, StatusFilter, TaskListQuery, TaskStore, TaskSummary,
    DEFAULT_PAGE_SIZE, PRIORITY_BATCH_SIZE,
};
pub use service::reconciler::{
    plan_shifts, reconcile, PriorityShift, ReconcileOutcome, ShiftPlan, SkipReason, WriteIntent,
};
pub use service::task_service::{TaskDraft, TaskService, TaskServiceError, TaskWrite};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
