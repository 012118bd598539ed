//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable task persistence APIs over canonical `tasks` storage.
//! - Apply displacement batches and their triggering write atomically.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Task::validate()` before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.
//! - Every query is scoped to one owner; cross-owner reads are impossible
//!   through this API.
//! - Unique-index violations on active priorities surface as
//!   `RepoError::Conflict`, never as generic DB errors.

use crate::db::DbError;
use crate::model::task::{Task, TaskId, TaskValidationError, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    title,
    description,
    priority,
    completed,
    deleted
FROM tasks";

const TASKS_REQUIRED_COLUMNS: &[&str] = &[
    "uuid",
    "user_id",
    "title",
    "description",
    "priority",
    "completed",
    "deleted",
    "created_at",
    "updated_at",
];

const LIST_DEFAULT_LIMIT: u32 = 10;
const LIST_LIMIT_MAX: u32 = 50;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    /// An active-priority write lost a race with a concurrent writer for
    /// the same owner, or was computed against stale reads. The whole
    /// displacement plan must be recomputed and retried.
    Conflict(UserId),
    /// A displacement chain reached the maximum representable priority,
    /// leaving no slot for the last occupant to shift into.
    PriorityExhausted(UserId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Conflict(owner) => {
                write!(f, "concurrent priority conflict for owner {owner}")
            }
            Self::PriorityExhausted(owner) => write!(
                f,
                "priority chain for owner {owner} reached the maximum supported priority"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection not migrated: schema version {actual_version}, expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
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

/// One scheduled priority shift produced by a chain walk.
///
/// The repository applies a batch of these together with the triggering
/// insert/update in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displacement {
    /// The occupant being pushed out of its slot.
    pub task: Task,
    /// Its new priority, always `task.priority + 1`.
    pub new_priority: u32,
}

/// Query options for listing tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    /// Optional case-insensitive title substring filter.
    pub title_contains: Option<String>,
    /// Optional completion filter; `None` lists both.
    pub completed: Option<bool>,
    /// Include soft-deleted tombstones. Off by default.
    pub include_deleted: bool,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for task persistence.
///
/// Methods that write a displacement batch take `&mut self` because they
/// must run inside one transaction.
pub trait TaskRepository {
    /// Inserts a new task after applying `displacements`, atomically.
    fn insert_task(&mut self, task: &Task, displacements: &[Displacement]) -> RepoResult<TaskId>;
    /// Rewrites an existing task's fields after applying `displacements`,
    /// atomically. The row is matched by (uuid, owner) among non-deleted
    /// rows.
    fn update_task(&mut self, task: &Task, displacements: &[Displacement]) -> RepoResult<()>;
    /// Gets one task by id, scoped to `owner`.
    fn get_task(&self, id: TaskId, owner: UserId, include_deleted: bool)
        -> RepoResult<Option<Task>>;
    /// Finds the active occupant of `priority` for `owner`, if any.
    fn find_active_at(&self, owner: UserId, priority: u32) -> RepoResult<Option<Task>>;
    /// Lists all active (not completed, not deleted) tasks for `owner`,
    /// sorted by priority ascending.
    fn list_active(&self, owner: UserId) -> RepoResult<Vec<Task>>;
    /// Lists tasks for `owner` using filter and pagination options.
    fn list_tasks(&self, owner: UserId, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    /// Soft-deletes one task by id, scoped to `owner`. Already-deleted
    /// rows are reported as `NotFound`.
    fn soft_delete_task(&mut self, id: TaskId, owner: UserId) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    ///
    /// # Errors
    /// Rejects connections whose schema version does not match this
    /// binary, or whose `tasks` table/columns are missing.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert_task(&mut self, task: &Task, displacements: &[Displacement]) -> RepoResult<TaskId> {
        task.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        apply_displacements(&tx, displacements)?;

        tx.execute(
            "INSERT INTO tasks (
                uuid,
                user_id,
                title,
                description,
                priority,
                completed,
                deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                task.uuid.to_string(),
                task.owner.to_string(),
                task.title.as_str(),
                task.description.as_str(),
                i64::from(task.priority),
                bool_to_int(task.completed),
                bool_to_int(task.deleted),
            ],
        )
        .map_err(|err| map_write_error(err, task.owner))?;

        tx.commit()?;
        Ok(task.uuid)
    }

    fn update_task(&mut self, task: &Task, displacements: &[Displacement]) -> RepoResult<()> {
        task.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // A chain can end by displacing an occupant into the slot this task
        // is vacating. Park the task beyond the owner's highest priority
        // first so every displacement statement sees that slot as free.
        if !displacements.is_empty() {
            park_task(&tx, task)?;
        }

        apply_displacements(&tx, displacements)?;

        let changed = tx
            .execute(
                "UPDATE tasks
                 SET
                    user_id = ?2,
                    title = ?3,
                    description = ?4,
                    priority = ?5,
                    completed = ?6,
                    deleted = ?7,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND user_id = ?2
                   AND deleted = 0;",
                params![
                    task.uuid.to_string(),
                    task.owner.to_string(),
                    task.title.as_str(),
                    task.description.as_str(),
                    i64::from(task.priority),
                    bool_to_int(task.completed),
                    bool_to_int(task.deleted),
                ],
            )
            .map_err(|err| map_write_error(err, task.owner))?;

        if changed == 0 {
            // Rolls back any displacements applied above.
            return Err(RepoError::NotFound(task.uuid));
        }

        tx.commit()?;
        Ok(())
    }

    fn get_task(
        &self,
        id: TaskId,
        owner: UserId,
        include_deleted: bool,
    ) -> RepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE uuid = ?1
               AND user_id = ?2
               AND (?3 = 1 OR deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![
            id.to_string(),
            owner.to_string(),
            bool_to_int(include_deleted)
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn find_active_at(&self, owner: UserId, priority: u32) -> RepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE user_id = ?1
               AND priority = ?2
               AND completed = 0
               AND deleted = 0;"
        ))?;

        let mut rows = stmt.query(params![owner.to_string(), i64::from(priority)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn list_active(&self, owner: UserId) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE user_id = ?1
               AND completed = 0
               AND deleted = 0
             ORDER BY priority ASC;"
        ))?;

        let mut rows = stmt.query([owner.to_string()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        Ok(tasks)
    }

    fn list_tasks(&self, owner: UserId, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE user_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(owner.to_string())];

        if !query.include_deleted {
            sql.push_str(" AND deleted = 0");
        }

        if let Some(completed) = query.completed {
            sql.push_str(" AND completed = ?");
            bind_values.push(Value::Integer(bool_to_int(completed)));
        }

        if let Some(needle) = query.title_contains.as_deref() {
            // LIKE is case-insensitive for ASCII in SQLite, matching the
            // listing contract. `%`/`_` in the needle are treated literally.
            sql.push_str(" AND title LIKE '%' || ? || '%' ESCAPE '\\'");
            bind_values.push(Value::Text(escape_like(needle)));
        }

        sql.push_str(" ORDER BY priority ASC, uuid ASC");

        let limit = normalize_list_limit(query.limit);
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
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

    fn soft_delete_task(&mut self, id: TaskId, owner: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND user_id = ?2
               AND deleted = 0;",
            params![id.to_string(), owner.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

/// Clamps a caller-provided list limit to the supported window.
pub fn normalize_list_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => LIST_DEFAULT_LIMIT,
        Some(value) => value.min(LIST_LIMIT_MAX),
    }
}

/// Applies a displacement batch inside an open transaction.
///
/// Statements run from the highest target slot downward so each one
/// individually satisfies the active-priority unique index: the chain tail
/// moves into the free slot first, vacating room for its predecessor.
fn apply_displacements(tx: &rusqlite::Transaction<'_>, displacements: &[Displacement]) -> RepoResult<()> {
    let mut ordered: Vec<&Displacement> = displacements.iter().collect();
    ordered.sort_by(|a, b| b.new_priority.cmp(&a.new_priority));

    for displacement in ordered {
        let task = &displacement.task;
        let changed = tx
            .execute(
                "UPDATE tasks
                 SET
                    priority = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND user_id = ?2
                   AND priority = ?4
                   AND completed = 0
                   AND deleted = 0;",
                params![
                    task.uuid.to_string(),
                    task.owner.to_string(),
                    i64::from(displacement.new_priority),
                    i64::from(task.priority),
                ],
            )
            .map_err(|err| map_write_error(err, task.owner))?;

        // Zero rows means the occupant moved, completed, or was deleted
        // after the plan was computed; the plan is stale.
        if changed == 0 {
            return Err(RepoError::Conflict(task.owner));
        }
    }

    Ok(())
}

/// Moves a task above the owner's highest stored priority inside an open
/// transaction, freeing its current slot for the displacement batch.
///
/// Two past the maximum, not one: a chain tail may target `MAX + 1` when
/// the owner's top slot is occupied, so `MAX + 1` is not guaranteed free.
fn park_task(tx: &rusqlite::Transaction<'_>, task: &Task) -> RepoResult<()> {
    let changed = tx
        .execute(
            "UPDATE tasks
             SET priority = (
                SELECT COALESCE(MAX(priority), 0) + 2
                FROM tasks
                WHERE user_id = ?2
             )
             WHERE uuid = ?1
               AND user_id = ?2
               AND deleted = 0;",
            params![task.uuid.to_string(), task.owner.to_string()],
        )
        .map_err(|err| map_write_error(err, task.owner))?;

    if changed == 0 {
        return Err(RepoError::NotFound(task.uuid));
    }

    Ok(())
}

/// Maps unique-index violations to `Conflict`; everything else stays a
/// transport error.
fn map_write_error(err: rusqlite::Error, owner: UserId) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            return RepoError::Conflict(owner);
        }
    }
    RepoError::Db(DbError::Sqlite(err))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = crate::db::migrations::latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tasks';",
        [],
        |row| row.get(0),
    )?;
    if table_count == 0 {
        return Err(RepoError::MissingRequiredTable("tasks"));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('tasks');")?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(0)?);
    }
    for &required in TASKS_REQUIRED_COLUMNS {
        if !columns.iter().any(|name| name == required) {
            return Err(RepoError::MissingRequiredColumn {
                table: "tasks",
                column: required,
            });
        }
    }

    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in tasks.uuid"))
    })?;

    let owner_text: String = row.get("user_id")?;
    let owner = Uuid::parse_str(&owner_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid owner value `{owner_text}` in tasks.user_id"
        ))
    })?;

    let priority_raw: i64 = row.get("priority")?;
    let priority = u32::try_from(priority_raw).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid priority value `{priority_raw}` in tasks.priority"
        ))
    })?;

    let task = Task {
        uuid,
        owner,
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
        completed: int_to_bool(row.get("completed")?, "tasks.completed")?,
        deleted: int_to_bool(row.get("deleted")?, "tasks.deleted")?,
    };
    task.validate()?;
    Ok(task)
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
