//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the transactional task store contract the reconciler needs.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Task::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `OwnerMismatch`)
//!   in addition to DB transport errors.

pub mod task_repo;
