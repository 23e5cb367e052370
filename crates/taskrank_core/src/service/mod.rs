//! Core use-case services.
//!
//! # Responsibility
//! - Reconcile task priorities on every create/update.
//! - Orchestrate ownership checks, validation and repository calls into
//!   use-case level APIs.
//! - Keep callers decoupled from storage details.

pub mod reconciler;
pub mod task_service;
