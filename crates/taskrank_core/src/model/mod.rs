//! Domain model for ranked task lists.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod task;
