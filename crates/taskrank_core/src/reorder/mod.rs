//! Priority reordering engine.
//!
//! # Responsibility
//! - Decide which tasks must shift so a candidate priority can be taken
//!   without duplicating any active priority for the owner.
//! - Report the shifts; applying them is the repository's job.
//!
//! # Invariants
//! - Only active tasks (not completed, not deleted) count as occupants.
//! - Each task is displaced at most once per plan.
//! - Planning never mutates the store.

mod engine;

pub use engine::{plan_displacements, ReorderMode};
