//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by repository, engine and
//!   service layers.
//! - Provide lifecycle helpers for soft-delete and completion semantics.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another task.
//! - `deleted` is the source of truth for tombstone state.
//! - `priority` is a positive integer; zero never passes validation.
//! - Among one owner's tasks with `completed == false` and
//!   `deleted == false`, priorities are unique (enforced by the reorder
//!   engine and the storage schema, not by this struct).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a task record.
pub type TaskId = Uuid;

/// Stable identifier for a task owner.
///
/// Kept as a type alias to make ownership scoping explicit in signatures;
/// account management itself lives outside this crate.
pub type UserId = Uuid;

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable global ID used for lookups and auditing.
    pub uuid: TaskId,
    /// Owning user. Every query and mutation is scoped to this value.
    pub owner: UserId,
    /// Short human-readable title. Must not be blank.
    pub title: String,
    /// Free-form body text. May be empty.
    pub description: String,
    /// Rank among the owner's active tasks. Positive, lower is more urgent.
    pub priority: u32,
    /// Completion flag. Completed tasks keep their last priority but no
    /// longer participate in uniqueness reasoning.
    pub completed: bool,
    /// Soft delete tombstone to preserve history.
    pub deleted: bool,
}

/// Field-level validation failure for task records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Task ID is the nil UUID.
    NilUuid,
    /// Owner ID is the nil UUID.
    NilOwner,
    /// Title is empty or whitespace-only.
    EmptyTitle,
    /// Priority must be a positive integer.
    ZeroPriority,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "task uuid must not be nil"),
            Self::NilOwner => write!(f, "task owner must not be nil"),
            Self::EmptyTitle => write!(f, "task title must not be empty"),
            Self::ZeroPriority => write!(f, "task priority must be a positive integer"),
        }
    }
}

impl Error for TaskValidationError {}

impl Task {
    /// Creates a new task with a generated stable ID.
    ///
    /// # Invariants
    /// - `completed` and `deleted` start as `false`.
    pub fn new(
        owner: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), owner, title, description, priority)
    }

    /// Creates a task with a caller-provided stable ID.
    ///
    /// Used by import paths and tests where identity already exists.
    /// Does not validate; call [`Task::validate`] before persisting.
    pub fn with_id(
        uuid: TaskId,
        owner: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            uuid,
            owner,
            title: title.into(),
            description: description.into(),
            priority,
            completed: false,
            deleted: false,
        }
    }

    /// Checks field-level invariants prior to persistence.
    ///
    /// # Errors
    /// Returns the first violated rule, checked in declaration order.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.uuid.is_nil() {
            return Err(TaskValidationError::NilUuid);
        }
        if self.owner.is_nil() {
            return Err(TaskValidationError::NilOwner);
        }
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if self.priority == 0 {
            return Err(TaskValidationError::ZeroPriority);
        }
        Ok(())
    }

    /// Marks this task as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }

    /// Returns whether this task participates in priority uniqueness:
    /// not completed and not deleted.
    pub fn is_active(&self) -> bool {
        !self.completed && !self.deleted
    }
}
