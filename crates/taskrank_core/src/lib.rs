//! Core domain logic for taskrank, a personal task tracker whose active
//! tasks keep duplicate-free priorities per owner.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod reorder;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{Task, TaskId, TaskValidationError, UserId};
pub use reorder::{plan_displacements, ReorderMode};
pub use repo::task_repo::{
    Displacement, RepoError, RepoResult, SqliteTaskRepository, TaskListQuery, TaskRepository,
};
pub use service::task_service::{
    CreateTaskRequest, TaskService, TaskServiceError, UpdateTaskRequest,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
