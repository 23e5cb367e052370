//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `taskrank_core` linkage.
//! - Run one in-memory reconciliation so storage and ranking wiring are
//!   checked without any external setup.
//! - Keep output deterministic for quick local sanity checks.

use std::process::ExitCode;
use taskrank_core::db::open_db_in_memory;
use taskrank_core::{SqliteTaskStore, TaskDraft, TaskService};
use uuid::Uuid;

fn main() -> ExitCode {
    println!("taskrank_core ping={}", taskrank_core::ping());
    println!("taskrank_core version={}", taskrank_core::core_version());

    match reconcile_probe() {
        Ok(shifted) => {
            println!("taskrank_core reconcile_probe=ok shifted={shifted}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("taskrank_core reconcile_probe=error error={err}");
            ExitCode::FAILURE
        }
    }
}

/// Inserts two tasks at the same priority and reports how many were shifted.
fn reconcile_probe() -> Result<usize, Box<dyn std::error::Error>> {
    let conn = open_db_in_memory()?;
    let service = TaskService::new(SqliteTaskStore::new(&conn));
    let owner = Uuid::new_v4();

    service.create_task(owner, TaskDraft::new("probe first", 0))?;
    let second = service.create_task(owner, TaskDraft::new("probe second", 0))?;
    Ok(second.outcome.shifts.len())
}
