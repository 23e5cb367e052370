//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical record for one user's ranked to-do item.
//! - Provide lifecycle helpers for completion and soft-delete semantics.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `owner` is set at creation and never reassigned.
//! - Only active, incomplete tasks take part in priority ranking.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one task.
pub type TaskId = Uuid;

/// Stable identifier of the user owning a task.
pub type OwnerId = Uuid;

/// Canonical domain record for one ranked task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner: OwnerId,
    pub title: String,
    pub description: Option<String>,
    /// Rank among the owner's active, incomplete tasks. Unique within that
    /// set after every reconciled write.
    pub priority: i64,
    pub completed: bool,
    /// Soft delete tombstone.
    pub deleted: bool,
}

/// Validation errors for task write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    BlankTitle,
    NegativePriority(i64),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "task title must not be blank"),
            Self::NegativePriority(value) => {
                write!(f, "task priority must be non-negative, got {value}")
            }
        }
    }
}

impl Error for TaskValidationError {}

impl Task {
    /// Creates a new active, incomplete task with a generated stable ID.
    pub fn new(owner: OwnerId, title: impl Into<String>, priority: i64) -> Self {
        Self::with_id(Uuid::new_v4(), owner, title, priority)
    }

    /// Creates a task with a caller-provided stable ID.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(id: TaskId, owner: OwnerId, title: impl Into<String>, priority: i64) -> Self {
        Self {
            id,
            owner,
            title: title.into(),
            description: None,
            priority,
            completed: false,
            deleted: false,
        }
    }

    /// Marks this task as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }

    /// Returns whether this task is visible (not tombstoned).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Returns whether this task holds a slot in its owner's ranking.
    pub fn is_ranked(&self) -> bool {
        !self.deleted && !self.completed
    }

    /// Checks field-level invariants required before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        if self.priority < 0 {
            return Err(TaskValidationError::NegativePriority(self.priority));
        }
        Ok(())
    }
}
