use taskrank_core::db::open_db_in_memory;
use taskrank_core::{
    SkipReason, SqliteTaskStore, StatusFilter, TaskDraft, TaskListQuery, TaskService,
    TaskServiceError, TaskStore, TaskSummary, TaskValidationError,
};
use uuid::Uuid;

fn draft(title: &str, priority: i64) -> TaskDraft {
    TaskDraft::new(title, priority)
}

#[test]
fn create_places_task_exactly_and_shifts_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();

    let a = service.create_task(owner, draft("A", 3)).unwrap().task;
    let b = service.create_task(owner, draft("B", 4)).unwrap().task;
    let c = service.create_task(owner, draft("C", 5)).unwrap().task;
    let d = service.create_task(owner, draft("D", 4)).unwrap();

    assert_eq!(d.task.priority, 4);
    assert_eq!(d.task.owner, owner);
    assert_eq!(d.outcome.shifts.len(), 2);
    assert_eq!(service.get_task(owner, a.id).unwrap().priority, 3);
    assert_eq!(service.get_task(owner, b.id).unwrap().priority, 5);
    assert_eq!(service.get_task(owner, c.id).unwrap().priority, 6);
}

#[test]
fn create_normalizes_draft_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();

    let mut input = draft("  buy milk  ", 0);
    input.description = Some("  ".to_string());
    let created = service.create_task(owner, input).unwrap().task;

    let loaded = service.get_task(owner, created.id).unwrap();
    assert_eq!(loaded.title, "buy milk");
    assert_eq!(loaded.description, None);
}

#[test]
fn create_rejects_invalid_drafts_without_side_effects() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    let existing = service.create_task(owner, draft("existing", 0)).unwrap().task;

    let err = service.create_task(owner, draft("   ", 0)).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Validation(TaskValidationError::BlankTitle)
    ));

    let err = service.create_task(owner, draft("negative", -2)).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Validation(TaskValidationError::NegativePriority(-2))
    ));
    assert!(!err.is_retryable());

    assert_eq!(service.get_task(owner, existing.id).unwrap().priority, 0);
    assert_eq!(service.summarize(owner).unwrap().total_tasks, 1);
}

#[test]
fn update_moves_task_and_keeps_owner() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    let a = service.create_task(owner, draft("A", 3)).unwrap().task;
    let b = service.create_task(owner, draft("B", 5)).unwrap().task;
    let c = service.create_task(owner, draft("C", 6)).unwrap().task;

    let mut edit = draft("B edited", 3);
    edit.description = Some("moved up".to_string());
    let updated = service.update_task(owner, b.id, edit).unwrap();

    assert_eq!(updated.task.priority, 3);
    assert_eq!(updated.task.owner, owner);
    assert_eq!(updated.task.title, "B edited");
    assert_eq!(service.get_task(owner, a.id).unwrap().priority, 4);
    assert_eq!(service.get_task(owner, c.id).unwrap().priority, 6);
    assert_eq!(
        service.get_task(owner, b.id).unwrap().description.as_deref(),
        Some("moved up")
    );
}

#[test]
fn update_marking_completed_skips_reconciliation() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    let a = service.create_task(owner, draft("A", 1)).unwrap().task;
    let b = service.create_task(owner, draft("B", 2)).unwrap().task;

    let mut done = draft("B", 1);
    done.completed = true;
    let updated = service.update_task(owner, b.id, done).unwrap();

    assert_eq!(updated.outcome.skipped, Some(SkipReason::Completed));
    assert_eq!(service.get_task(owner, a.id).unwrap().priority, 1);
    assert_eq!(service.get_task(owner, b.id).unwrap().priority, 1);
}

#[test]
fn reopening_completed_task_reclaims_its_slot() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    let a = service.create_task(owner, draft("A", 1)).unwrap().task;
    let mut completed = draft("B", 1);
    completed.completed = true;
    let b = service.create_task(owner, completed).unwrap().task;

    service.update_task(owner, b.id, draft("B", 1)).unwrap();

    assert_eq!(service.get_task(owner, b.id).unwrap().priority, 1);
    assert_eq!(service.get_task(owner, a.id).unwrap().priority, 2);
}

#[test]
fn foreign_tasks_cannot_be_read_updated_or_deleted() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let task = service.create_task(owner, draft("private", 2)).unwrap().task;

    assert!(matches!(
        service.get_task(intruder, task.id),
        Err(TaskServiceError::NotOwner(id)) if id == task.id
    ));
    assert!(matches!(
        service.update_task(intruder, task.id, draft("stolen", 0)),
        Err(TaskServiceError::NotOwner(_))
    ));
    assert!(matches!(
        service.delete_task(intruder, task.id),
        Err(TaskServiceError::NotOwner(_))
    ));

    let loaded = service.get_task(owner, task.id).unwrap();
    assert_eq!(loaded.title, "private");
    assert_eq!(loaded.priority, 2);
    assert!(conn.is_autocommit());
}

#[test]
fn missing_tasks_report_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.get_task(owner, missing),
        Err(TaskServiceError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.update_task(owner, missing, draft("x", 0)),
        Err(TaskServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_task(owner, missing),
        Err(TaskServiceError::NotFound(_))
    ));
}

#[test]
fn delete_hides_task_and_leaves_priorities_alone() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    let a = service.create_task(owner, draft("A", 3)).unwrap().task;
    let b = service.create_task(owner, draft("B", 4)).unwrap().task;
    let c = service.create_task(owner, draft("C", 5)).unwrap().task;

    service.delete_task(owner, b.id).unwrap();

    assert!(matches!(
        service.get_task(owner, b.id),
        Err(TaskServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_task(owner, b.id),
        Err(TaskServiceError::NotFound(_))
    ));
    assert_eq!(service.get_task(owner, a.id).unwrap().priority, 3);
    assert_eq!(service.get_task(owner, c.id).unwrap().priority, 5);

    let tombstone = SqliteTaskStore::new(&conn)
        .get_task(b.id, true)
        .unwrap()
        .unwrap();
    assert!(tombstone.deleted);
    assert_eq!(tombstone.priority, 4);
}

#[test]
fn list_and_summary_follow_status_and_pages() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();
    for priority in 0..6 {
        service
            .create_task(owner, draft(&format!("open {priority}"), priority))
            .unwrap();
    }
    let mut completed = draft("done", 2);
    completed.completed = true;
    service.create_task(owner, completed).unwrap();
    let gone = service.create_task(owner, draft("gone", 10)).unwrap().task;
    service.delete_task(owner, gone.id).unwrap();
    service
        .create_task(Uuid::new_v4(), draft("someone else", 1))
        .unwrap();

    let first_page = service
        .list_tasks(owner, &TaskListQuery::page(1, None))
        .unwrap();
    assert_eq!(first_page.len(), 5);
    assert!(first_page
        .windows(2)
        .all(|pair| pair[0].priority >= pair[1].priority));
    assert_eq!(
        service
            .list_tasks(owner, &TaskListQuery::page(2, None))
            .unwrap()
            .len(),
        2
    );

    let status = StatusFilter::parse("completed");
    let done = service
        .list_tasks(owner, &TaskListQuery::page(1, status))
        .unwrap();
    assert_eq!(done.len(), 1);
    assert!(done[0].completed);

    let pending = service
        .list_tasks(owner, &TaskListQuery::page(1, StatusFilter::parse("pending")))
        .unwrap();
    assert!(pending.iter().all(|task| !task.completed));

    assert_eq!(
        service.summarize(owner).unwrap(),
        TaskSummary {
            total_tasks: 7,
            completed_tasks: 1,
        }
    );
}

#[test]
fn service_errors_expose_sources() {
    use std::error::Error;

    let err = TaskServiceError::Validation(TaskValidationError::BlankTitle);
    assert!(err.source().is_some());
    assert_eq!(err.to_string(), "task title must not be blank");

    let id = Uuid::new_v4();
    let err = TaskServiceError::NotOwner(id);
    assert!(err.source().is_none());
    assert!(err.to_string().contains(&id.to_string()));

    let store_err = SqliteTaskStore::new(&open_db_in_memory().unwrap())
        .lock_for_update(&[])
        .unwrap_err();
    let err = TaskServiceError::from(store_err);
    assert!(matches!(err, TaskServiceError::Repo(_)));
    assert!(!err.is_retryable());
}
