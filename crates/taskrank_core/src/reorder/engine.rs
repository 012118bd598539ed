//! Chain-walk planning for priority collisions.
//!
//! # Responsibility
//! - Walk the priority chain upward from a candidate slot until a free one
//!   is found, scheduling one `+1` shift per displaced occupant.
//!
//! # Invariants
//! - The walk visits strictly increasing slots, so no occupant is
//!   scheduled twice.
//! - Displacements are reported in discovery order, lowest priority first.
//! - A plan is a pure function of store state and input; re-planning
//!   against an unchanged store yields the same result.

use crate::model::task::{TaskId, UserId};
use crate::repo::task_repo::{Displacement, RepoError, RepoResult, TaskRepository};
use std::collections::BTreeMap;

/// Operation context for a planning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderMode {
    /// A new task is being inserted; no prior stored priority exists.
    Create,
    /// An existing task is being edited.
    Update {
        /// The task being edited. It is never its own occupant: the slot
        /// it currently holds counts as vacated during the walk.
        task: TaskId,
        /// True iff the requested priority differs from the priority
        /// currently stored for `task`. When false, the algorithm does
        /// not run at all.
        priority_changed: bool,
    },
}

/// Plans the displacement batch needed for `owner` to take `priority`.
///
/// Returns the ordered list of (occupant, occupant.priority + 1) shifts,
/// lowest slot first, or an empty plan when the slot is free. The caller
/// must apply the whole batch together with the triggering write; see
/// `TaskRepository::insert_task` / `update_task`.
///
/// # Contract
/// - `ReorderMode::Update { priority_changed: false, .. }` is a no-op and
///   performs no store reads.
/// - Completed and deleted tasks are never occupants; a candidate priority
///   colliding only with such tasks yields an empty plan.
/// - Applying the plan and then persisting the triggering task at
///   `priority` leaves the owner's active priorities duplicate-free,
///   provided they were duplicate-free before.
pub fn plan_displacements<R: TaskRepository>(
    repo: &R,
    owner: UserId,
    priority: u32,
    mode: ReorderMode,
) -> RepoResult<Vec<Displacement>> {
    let moving_task = match mode {
        ReorderMode::Create => None,
        ReorderMode::Update {
            task,
            priority_changed,
        } => {
            if !priority_changed {
                return Ok(Vec::new());
            }
            Some(task)
        }
    };

    // Fast path: one targeted read settles the common no-collision case.
    match repo.find_active_at(owner, priority)? {
        None => return Ok(Vec::new()),
        Some(occupant) if Some(occupant.uuid) == moving_task => return Ok(Vec::new()),
        Some(_) => {}
    }

    // Collision: batch-read the owner's active tasks once and walk the
    // chain in memory instead of issuing one store read per slot.
    let mut by_priority: BTreeMap<u32, _> = BTreeMap::new();
    for task in repo.list_active(owner)? {
        if Some(task.uuid) == moving_task {
            continue;
        }
        by_priority.insert(task.priority, task);
    }

    let mut plan = Vec::new();
    let mut slot = priority;
    // `remove` consumes each occupant, so the walk terminates after at
    // most the owner's active-task count and never revisits a slot.
    while let Some(task) = by_priority.remove(&slot) {
        // An occupant at u32::MAX has no slot to shift into; reject the
        // request instead of wrapping to 0.
        slot = slot
            .checked_add(1)
            .ok_or(RepoError::PriorityExhausted(owner))?;
        plan.push(Displacement {
            task,
            new_priority: slot,
        });
    }

    Ok(plan)
}
