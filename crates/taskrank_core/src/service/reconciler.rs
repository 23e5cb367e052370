//! Priority reconciliation for task writes.
//!
//! # Responsibility
//! - Keep one owner's active, incomplete priorities collision-free whenever a
//!   task is created or updated.
//! - Run the conflict scan, lock, shift batch and triggering write as one
//!   atomic unit.
//!
//! # Invariants
//! - The written task always keeps exactly the requested priority.
//! - Only a contiguous run of conflicts starting at the target is shifted;
//!   the first strict gap ends the walk.
//! - Priorities of other tasks only ever increase.
//! - Deletes and completed tasks never move other tasks.

use crate::model::task::{OwnerId, Task, TaskId};
use crate::repo::task_repo::{RepoError, RepoResult, TaskStore};
use log::{debug, error, info};
use std::time::Instant;

/// What the caller is doing with the task being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteIntent {
    /// Create or update.
    Save,
    /// Soft delete. Never reconciles.
    Delete,
}

/// Why a write bypassed reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Delete,
    Completed,
}

/// One priority change applied to a conflicting task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityShift {
    pub task_id: TaskId,
    pub from: i64,
    pub to: i64,
}

/// Result of one reconciled write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    pub skipped: Option<SkipReason>,
    /// In ascending priority order.
    pub shifts: Vec<PriorityShift>,
}

/// Shifted copies of the conflicting tasks plus the changes they carry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShiftPlan {
    pub batch: Vec<Task>,
    pub shifts: Vec<PriorityShift>,
}

/// Computes the minimal shift batch for `target_priority`.
///
/// `conflicts` must be ascending by priority. Walks with a cursor starting at
/// the target: a task above the cursor ends the walk, anything else moves to
/// `cursor + 1`. Duplicate priorities in `conflicts` are shifted one after
/// another.
///
/// # Errors
/// - `RepoError::PriorityOverflow` when a shift would pass `i64::MAX`.
pub fn plan_shifts(conflicts: Vec<Task>, target_priority: i64) -> RepoResult<ShiftPlan> {
    let mut cursor = target_priority;
    let mut plan = ShiftPlan::default();

    for mut task in conflicts {
        if task.priority > cursor {
            break;
        }
        let next = cursor
            .checked_add(1)
            .ok_or(RepoError::PriorityOverflow(task.id))?;
        plan.shifts.push(PriorityShift {
            task_id: task.id,
            from: task.priority,
            to: next,
        });
        task.priority = next;
        plan.batch.push(task);
        cursor = next;
    }

    Ok(plan)
}

/// Writes `task` at `target_priority`, shifting the owner's conflicting tasks.
///
/// The caller must already have authorized `owner` for `task`. On return
/// `task.priority == target_priority` (and `task.deleted` is set for
/// [`WriteIntent::Delete`]).
///
/// # Errors
/// - Any store failure (lock contention, commit, validation) aborts the whole
///   write; no shift or triggering write is persisted. Nothing is retried here.
pub fn reconcile<S: TaskStore>(
    store: &S,
    owner: OwnerId,
    task: &mut Task,
    target_priority: i64,
    intent: WriteIntent,
) -> RepoResult<ReconcileOutcome> {
    task.priority = target_priority;

    let skipped = match intent {
        WriteIntent::Delete => {
            task.soft_delete();
            Some(SkipReason::Delete)
        }
        WriteIntent::Save if task.completed => Some(SkipReason::Completed),
        WriteIntent::Save => None,
    };

    if let Some(reason) = skipped {
        store.run_atomic(|store| store.save(task))?;
        debug!(
            "event=priority_reconcile module=reconciler status=skipped task_id={} reason={:?}",
            task.id, reason
        );
        return Ok(ReconcileOutcome {
            skipped,
            shifts: Vec::new(),
        });
    }

    let started_at = Instant::now();
    let result = store.run_atomic(|store| -> RepoResult<Vec<PriorityShift>> {
        let conflicts = store.query_conflicts(owner, target_priority, Some(task.id))?;
        store.lock_for_update(&conflicts)?;

        let plan = plan_shifts(conflicts, target_priority)?;
        if !plan.batch.is_empty() {
            store.batch_update_priority(&plan.batch)?;
        }
        store.save(task)?;
        Ok(plan.shifts)
    });

    match result {
        Ok(shifts) => {
            info!(
                "event=priority_reconcile module=reconciler status=ok task_id={} priority={} shifted={} duration_ms={}",
                task.id,
                target_priority,
                shifts.len(),
                started_at.elapsed().as_millis()
            );
            Ok(ReconcileOutcome {
                skipped: None,
                shifts,
            })
        }
        Err(err) => {
            error!(
                "event=priority_reconcile module=reconciler status=error task_id={} retryable={} duration_ms={} error={}",
                task.id,
                err.is_retryable(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}
