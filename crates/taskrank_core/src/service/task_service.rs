//! Task lifecycle service.
//!
//! # Responsibility
//! - Provide create/update/soft-delete/get/list entry points for callers
//!   acting on behalf of one authenticated owner.
//! - Run the reordering engine before every priority-taking write and
//!   persist its plan together with the triggering task.
//! - Retry the whole plan against fresh reads when a concurrent writer
//!   wins the race for a slot.
//!
//! # Invariants
//! - Every entry point is scoped to the requesting owner; foreign or
//!   tombstoned tasks surface as `NotFound`, never as silent success.
//! - Validation failures are rejected before the engine runs; no store
//!   mutation happens for an invalid request.
//! - A conflict that survives all retries is reported, never swallowed.

use crate::model::task::{Task, TaskId, TaskValidationError, UserId};
use crate::reorder::{plan_displacements, ReorderMode};
use crate::repo::task_repo::{RepoError, TaskListQuery, TaskRepository};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Upper bound on plan-recompute attempts after storage conflicts.
const MAX_REORDER_ATTEMPTS: u32 = 3;

/// Service error for task lifecycle use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Request fields failed validation; nothing was written.
    Validation(TaskValidationError),
    /// Target task does not exist, is deleted, or belongs to another owner.
    NotFound(TaskId),
    /// Concurrent writers kept invalidating the displacement plan.
    ConflictRetriesExhausted { owner: UserId, attempts: u32 },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::ConflictRetriesExhausted { owner, attempts } => write!(
                f,
                "priority reorder for owner {owner} still conflicting after {attempts} attempts"
            ),
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

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Request model for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    pub priority: u32,
    pub completed: bool,
}

/// Request model for rewriting a task's editable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    pub title: String,
    pub description: String,
    pub priority: u32,
    pub completed: bool,
}

/// Use-case service for the task lifecycle.
pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a task for `owner` at the requested priority.
    ///
    /// Runs the reordering engine in `Create` mode; any active occupants
    /// of the requested slot and its chain are shifted up by one, and the
    /// shifts persist atomically with the insert.
    ///
    /// # Errors
    /// - `Validation` before any store mutation.
    /// - `ConflictRetriesExhausted` when concurrent writers keep winning.
    pub fn create_task(
        &mut self,
        owner: UserId,
        request: &CreateTaskRequest,
    ) -> Result<Task, TaskServiceError> {
        let started_at = Instant::now();

        let mut task = Task::new(
            owner,
            request.title.clone(),
            request.description.clone(),
            request.priority,
        );
        task.completed = request.completed;
        task.validate().map_err(TaskServiceError::Validation)?;

        for attempt in 1..=MAX_REORDER_ATTEMPTS {
            let plan =
                plan_displacements(&self.repo, owner, request.priority, ReorderMode::Create)?;
            match self.repo.insert_task(&task, &plan) {
                Ok(_) => {
                    info!(
                        "event=task_create module=service status=ok owner={} task={} priority={} displaced={} attempt={} duration_ms={}",
                        owner,
                        task.uuid,
                        task.priority,
                        plan.len(),
                        attempt,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(task);
                }
                Err(RepoError::Conflict(_)) => {
                    warn!(
                        "event=reorder_conflict module=service status=retry op=create owner={} priority={} attempt={}",
                        owner, request.priority, attempt
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        error!(
            "event=reorder_conflict module=service status=error op=create owner={} priority={} attempts={}",
            owner, request.priority, MAX_REORDER_ATTEMPTS
        );
        Err(TaskServiceError::ConflictRetriesExhausted {
            owner,
            attempts: MAX_REORDER_ATTEMPTS,
        })
    }

    /// Rewrites the editable fields of the task identified by (`id`,
    /// `owner`).
    ///
    /// The stored priority is read fresh to decide whether the requested
    /// priority actually changed; when it did not, no other task is
    /// touched. Ownership is re-asserted on the persisted row.
    pub fn update_task(
        &mut self,
        owner: UserId,
        id: TaskId,
        request: &UpdateTaskRequest,
    ) -> Result<Task, TaskServiceError> {
        let started_at = Instant::now();

        let mut task = Task::with_id(
            id,
            owner,
            request.title.clone(),
            request.description.clone(),
            request.priority,
        );
        task.completed = request.completed;
        task.validate().map_err(TaskServiceError::Validation)?;

        for attempt in 1..=MAX_REORDER_ATTEMPTS {
            // Fresh read on every attempt: priority_changed must reflect
            // the stored row, not a stale in-memory copy.
            let stored = self
                .repo
                .get_task(id, owner, false)?
                .ok_or(TaskServiceError::NotFound(id))?;
            let priority_changed = request.priority != stored.priority;

            let plan = plan_displacements(
                &self.repo,
                owner,
                request.priority,
                ReorderMode::Update {
                    task: id,
                    priority_changed,
                },
            )?;
            match self.repo.update_task(&task, &plan) {
                Ok(()) => {
                    info!(
                        "event=task_update module=service status=ok owner={} task={} priority={} priority_changed={} displaced={} attempt={} duration_ms={}",
                        owner,
                        id,
                        task.priority,
                        priority_changed,
                        plan.len(),
                        attempt,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(task);
                }
                Err(RepoError::Conflict(_)) => {
                    warn!(
                        "event=reorder_conflict module=service status=retry op=update owner={} task={} priority={} attempt={}",
                        owner, id, request.priority, attempt
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        error!(
            "event=reorder_conflict module=service status=error op=update owner={} task={} priority={} attempts={}",
            owner, id, request.priority, MAX_REORDER_ATTEMPTS
        );
        Err(TaskServiceError::ConflictRetriesExhausted {
            owner,
            attempts: MAX_REORDER_ATTEMPTS,
        })
    }

    /// Soft-deletes the task identified by (`id`, `owner`).
    ///
    /// Leaves every other task untouched: soft delete may create gaps in
    /// the active priority sequence, never duplicates.
    pub fn soft_delete_task(&mut self, owner: UserId, id: TaskId) -> Result<(), TaskServiceError> {
        self.repo.soft_delete_task(id, owner)?;
        info!(
            "event=task_soft_delete module=service status=ok owner={} task={}",
            owner, id
        );
        Ok(())
    }

    /// Gets one task by id, scoped to `owner`. Tombstones are invisible.
    pub fn get_task(&self, owner: UserId, id: TaskId) -> Result<Task, TaskServiceError> {
        self.repo
            .get_task(id, owner, false)?
            .ok_or(TaskServiceError::NotFound(id))
    }

    /// Lists tasks for `owner` using filter and pagination options.
    pub fn list_tasks(
        &self,
        owner: UserId,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, TaskServiceError> {
        Ok(self.repo.list_tasks(owner, query)?)
    }
}
