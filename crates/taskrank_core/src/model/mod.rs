//! Domain model for the task tracker.
//!
//! # Responsibility
//! - Define the canonical task record used by core business logic.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId` and scoped to one owner.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod task;
