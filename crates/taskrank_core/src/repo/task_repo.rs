//! Task store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the transactional primitives used by priority reconciliation:
//!   conflict scan, row locking, batch priority update, single-row upsert.
//! - Provide read models for the task list shell.
//!
//! # Invariants
//! - Write paths must call `Task::validate()` before SQL mutations.
//! - `save` never reassigns the owner of an existing row.
//! - Read paths must reject invalid persisted state instead of masking it.
//!
//! # Locking
//! SQLite has no row locks. `run_atomic` opens `BEGIN IMMEDIATE`, which takes
//! the database write lock before any read, so a conflict scan inside it can
//! never observe another writer's uncommitted priorities.

use crate::db::DbError;
use crate::model::task::{OwnerId, Task, TaskId, TaskValidationError};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    owner,
    title,
    description,
    priority,
    is_completed,
    is_deleted
FROM tasks";

/// Maximum rows written by one batch priority statement.
pub const PRIORITY_BATCH_SIZE: usize = 1000;

/// Tasks per page for list views.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence, locking and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    /// An upsert targeted an existing row owned by someone else.
    OwnerMismatch(TaskId),
    /// A row lock was requested with no enclosing transaction.
    LockOutsideTransaction,
    /// Shifting this task would move its priority past `i64::MAX`.
    PriorityOverflow(TaskId),
    /// A batch update touched fewer rows than it was given.
    BatchMismatch {
        expected: usize,
        updated: usize,
    },
    InvalidData(String),
}

impl RepoError {
    /// Returns whether the operation failed on lock contention and may
    /// succeed when attempted again from the start.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Db(err) => err.is_busy(),
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::OwnerMismatch(id) => write!(f, "task {id} belongs to another owner"),
            Self::LockOutsideTransaction => {
                write!(f, "row locks require an enclosing transaction")
            }
            Self::PriorityOverflow(id) => write!(f, "priority overflow while shifting task {id}"),
            Self::BatchMismatch { expected, updated } => write!(
                f,
                "batch priority update expected {expected} rows, updated {updated}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Completion filter for list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Completed,
    Pending,
}

impl StatusFilter {
    /// Parses a `status` request value. Unknown values mean "no filter".
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "completed" => Some(Self::Completed),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

/// Query options for listing one owner's active tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub status: Option<StatusFilter>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl TaskListQuery {
    /// Builds a query for one 1-based page of [`DEFAULT_PAGE_SIZE`] rows.
    /// Page `0` is treated as the first page.
    pub fn page(page: u32, status: Option<StatusFilter>) -> Self {
        Self {
            status,
            limit: Some(DEFAULT_PAGE_SIZE),
            offset: page.saturating_sub(1).saturating_mul(DEFAULT_PAGE_SIZE),
        }
    }
}

/// Counters shown next to a task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSummary {
    pub total_tasks: u64,
    pub completed_tasks: u64,
}

/// Transactional task storage used by the priority reconciler.
pub trait TaskStore {
    /// Runs `op` as one all-or-nothing transaction. A call made while a
    /// transaction is already open joins it.
    fn run_atomic<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
    /// Loads the owner's active, incomplete tasks with `priority >=
    /// min_priority`, ascending by priority, skipping `exclude_id`.
    fn query_conflicts(
        &self,
        owner: OwnerId,
        min_priority: i64,
        exclude_id: Option<TaskId>,
    ) -> RepoResult<Vec<Task>>;
    /// Holds exclusive locks on `tasks` until the current transaction ends.
    fn lock_for_update(&self, tasks: &[Task]) -> RepoResult<()>;
    /// Persists only the `priority` field of every task.
    fn batch_update_priority(&self, tasks: &[Task]) -> RepoResult<()>;
    /// Inserts or updates one task.
    fn save(&self, task: &Task) -> RepoResult<()>;
    fn get_task(&self, id: TaskId, include_deleted: bool) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, owner: OwnerId, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    fn summarize(&self, owner: OwnerId) -> RepoResult<TaskSummary>;
}

/// SQLite-backed task store.
pub struct SqliteTaskStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskStore for SqliteTaskStore<'_> {
    fn run_atomic<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return op(self);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| E::from(RepoError::from(err)))?;
        // Dropping `tx` on the error path rolls everything back.
        let value = op(self)?;
        tx.commit().map_err(|err| E::from(RepoError::from(err)))?;
        Ok(value)
    }

    fn query_conflicts(
        &self,
        owner: OwnerId,
        min_priority: i64,
        exclude_id: Option<TaskId>,
    ) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE owner = ?1
               AND is_deleted = 0
               AND is_completed = 0
               AND priority >= ?2
               AND (?3 IS NULL OR id <> ?3)
             ORDER BY priority ASC, rowid ASC;"
        ))?;

        let mut rows = stmt.query(params![
            owner.to_string(),
            min_priority,
            exclude_id.map(|id| id.to_string()),
        ])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn lock_for_update(&self, tasks: &[Task]) -> RepoResult<()> {
        if self.conn.is_autocommit() {
            return Err(RepoError::LockOutsideTransaction);
        }
        // The IMMEDIATE transaction already holds the write lock.
        debug!(
            "event=lock_for_update module=repo status=ok rows={}",
            tasks.len()
        );
        Ok(())
    }

    fn batch_update_priority(&self, tasks: &[Task]) -> RepoResult<()> {
        for chunk in tasks.chunks(PRIORITY_BATCH_SIZE) {
            let mut sql = String::from("UPDATE tasks SET priority = CASE id");
            let mut bind_values: Vec<Value> = Vec::with_capacity(chunk.len() * 3);

            for task in chunk {
                sql.push_str(" WHEN ? THEN ?");
                bind_values.push(Value::Text(task.id.to_string()));
                bind_values.push(Value::Integer(task.priority));
            }
            sql.push_str(
                " ELSE priority END,
                 updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id IN (",
            );
            for (index, task) in chunk.iter().enumerate() {
                if index > 0 {
                    sql.push_str(", ");
                }
                sql.push('?');
                bind_values.push(Value::Text(task.id.to_string()));
            }
            sql.push_str(");");

            let updated = self.conn.execute(&sql, params_from_iter(bind_values))?;
            if updated != chunk.len() {
                return Err(RepoError::BatchMismatch {
                    expected: chunk.len(),
                    updated,
                });
            }
        }
        Ok(())
    }

    fn save(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let changed = self.conn.execute(
            "INSERT INTO tasks (
                id,
                owner,
                title,
                description,
                priority,
                is_completed,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                priority = excluded.priority,
                is_completed = excluded.is_completed,
                is_deleted = excluded.is_deleted,
                updated_at = (strftime('%s', 'now') * 1000)
            WHERE tasks.owner = excluded.owner;",
            params![
                task.id.to_string(),
                task.owner.to_string(),
                task.title.as_str(),
                task.description.as_deref(),
                task.priority,
                bool_to_int(task.completed),
                bool_to_int(task.deleted),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::OwnerMismatch(task.id));
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId, include_deleted: bool) -> RepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn list_tasks(&self, owner: OwnerId, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE owner = ? AND is_deleted = 0");
        let mut bind_values: Vec<Value> = vec![Value::Text(owner.to_string())];

        match query.status {
            Some(StatusFilter::Completed) => sql.push_str(" AND is_completed = 1"),
            Some(StatusFilter::Pending) => sql.push_str(" AND is_completed = 0"),
            None => {}
        }

        sql.push_str(" ORDER BY priority DESC, rowid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();

        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        Ok(tasks)
    }

    fn summarize(&self, owner: OwnerId) -> RepoResult<TaskSummary> {
        let (total, completed): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_completed), 0)
             FROM tasks
             WHERE owner = ?1
               AND is_deleted = 0;",
            [owner.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(TaskSummary {
            total_tasks: count_to_u64(total, "total")?,
            completed_tasks: count_to_u64(completed, "completed")?,
        })
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id = parse_uuid(&row.get::<_, String>("id")?, "tasks.id")?;
    let owner = parse_uuid(&row.get::<_, String>("owner")?, "tasks.owner")?;

    let task = Task {
        id,
        owner,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: row.get("priority")?,
        completed: int_to_bool(row.get("is_completed")?, "tasks.is_completed")?,
        deleted: int_to_bool(row.get("is_deleted")?, "tasks.is_deleted")?,
    };
    task.validate()?;
    Ok(task)
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn count_to_u64(value: i64, label: &'static str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative {label} count `{value}`")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
