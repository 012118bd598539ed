//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `taskrank_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use std::error::Error;
use taskrank_core::db::open_db_in_memory;
use taskrank_core::{CreateTaskRequest, SqliteTaskRepository, TaskListQuery, TaskService};
use uuid::Uuid;

fn main() -> Result<(), Box<dyn Error>> {
    println!("taskrank_core version={}", taskrank_core::core_version());

    // Exercise the reorder path end to end against an in-memory store:
    // two tasks at priorities 1 and 2, then a third claiming slot 1.
    let mut conn = open_db_in_memory()?;
    let repo = SqliteTaskRepository::try_new(&mut conn)?;
    let mut service = TaskService::new(repo);
    let owner = Uuid::new_v4();

    for (title, priority) in [("write report", 1), ("file expenses", 2), ("call dentist", 1)] {
        service.create_task(
            owner,
            &CreateTaskRequest {
                title: title.to_string(),
                description: String::new(),
                priority,
                completed: false,
            },
        )?;
    }

    for task in service.list_tasks(owner, &TaskListQuery::default())? {
        println!("priority={} title={}", task.priority, task.title);
    }

    Ok(())
}
