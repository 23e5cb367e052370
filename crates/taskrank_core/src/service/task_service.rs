//! Task list use-case service.
//!
//! # Responsibility
//! - Authorize every read/write against the acting owner before the core runs.
//! - Normalize and validate drafts.
//! - Route creates/updates through priority reconciliation and deletes
//!   through its skip path.
//!
//! # Invariants
//! - Tasks owned by someone else are never read or written.
//! - Update and delete load, check and write inside one transaction.
//! - Service layer remains storage-agnostic.

use crate::model::task::{OwnerId, Task, TaskId, TaskValidationError};
use crate::repo::task_repo::{RepoError, TaskListQuery, TaskStore, TaskSummary};
use crate::service::reconciler::{reconcile, ReconcileOutcome, WriteIntent};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller-supplied field values for a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: i64,
    pub completed: bool,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, priority: i64) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority,
            completed: false,
        }
    }

    fn normalized(self) -> Self {
        let description = self
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self {
            title: self.title.trim().to_string(),
            description,
            ..self
        }
    }
}

/// A persisted task together with the shifts its write caused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWrite {
    pub task: Task,
    pub outcome: ReconcileOutcome,
}

/// Errors from task service operations.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Draft failed field validation.
    Validation(TaskValidationError),
    /// Task does not exist or is soft-deleted.
    NotFound(TaskId),
    /// Task belongs to another owner.
    NotOwner(TaskId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl TaskServiceError {
    /// Returns whether the whole operation may be attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Repo(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::NotOwner(id) => write!(f, "task {id} is not owned by the acting user"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::OwnerMismatch(id) => Self::NotOwner(id),
            other => Self::Repo(other),
        }
    }
}

/// Task list service facade.
pub struct TaskService<S: TaskStore> {
    store: S,
}

impl<S: TaskStore> TaskService<S> {
    /// Creates service from store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a task for `owner` at exactly the drafted priority.
    pub fn create_task(
        &self,
        owner: OwnerId,
        draft: TaskDraft,
    ) -> Result<TaskWrite, TaskServiceError> {
        let draft = draft.normalized();
        let mut task = Task::new(owner, draft.title, draft.priority);
        task.description = draft.description;
        task.completed = draft.completed;
        task.validate()?;

        let outcome = reconcile(&self.store, owner, &mut task, draft.priority, WriteIntent::Save)?;
        Ok(TaskWrite { task, outcome })
    }

    /// Replaces the editable fields of one owned task.
    ///
    /// # Contract
    /// - The owner is never changed.
    /// - Reconciliation runs on every update, completed ones excepted.
    pub fn update_task(
        &self,
        owner: OwnerId,
        id: TaskId,
        draft: TaskDraft,
    ) -> Result<TaskWrite, TaskServiceError> {
        let draft = draft.normalized();
        self.store.run_atomic(|store| -> Result<TaskWrite, TaskServiceError> {
            let mut task = load_owned(store, owner, id)?;
            task.title = draft.title;
            task.description = draft.description;
            task.priority = draft.priority;
            task.completed = draft.completed;
            task.validate()?;

            let outcome = reconcile(store, owner, &mut task, draft.priority, WriteIntent::Save)?;
            Ok(TaskWrite { task, outcome })
        })
    }

    /// Soft-deletes one owned task. Other tasks keep their priorities.
    pub fn delete_task(&self, owner: OwnerId, id: TaskId) -> Result<(), TaskServiceError> {
        self.store.run_atomic(|store| -> Result<(), TaskServiceError> {
            let mut task = load_owned(store, owner, id)?;
            let priority = task.priority;
            reconcile(store, owner, &mut task, priority, WriteIntent::Delete)?;
            Ok(())
        })
    }

    /// Gets one active task visible to `owner`.
    pub fn get_task(&self, owner: OwnerId, id: TaskId) -> Result<Task, TaskServiceError> {
        load_owned(&self.store, owner, id)
    }

    /// Lists `owner`'s active tasks, highest priority value first.
    pub fn list_tasks(
        &self,
        owner: OwnerId,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, TaskServiceError> {
        self.store.list_tasks(owner, query).map_err(Into::into)
    }

    /// Counts `owner`'s active tasks.
    pub fn summarize(&self, owner: OwnerId) -> Result<TaskSummary, TaskServiceError> {
        self.store.summarize(owner).map_err(Into::into)
    }
}

fn load_owned<S: TaskStore>(
    store: &S,
    owner: OwnerId,
    id: TaskId,
) -> Result<Task, TaskServiceError> {
    let task = store
        .get_task(id, false)?
        .ok_or(TaskServiceError::NotFound(id))?;
    if task.owner != owner {
        return Err(TaskServiceError::NotOwner(id));
    }
    Ok(task)
}
