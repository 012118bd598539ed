use rusqlite::Connection;
use taskrank_core::db::migrations::latest_version;
use taskrank_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "tasks");
    assert_index_exists(&conn, "idx_tasks_active_priority");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskrank.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "tasks");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn active_priority_unique_index_rejects_duplicates_among_active_rows_only() {
    let conn = open_db_in_memory().unwrap();

    insert_raw(&conn, "u1", "t1", 3, false, false);
    // Completed and deleted rows may share the slot.
    insert_raw(&conn, "u1", "t2", 3, true, false);
    insert_raw(&conn, "u1", "t3", 3, false, true);
    // Another owner may share the slot.
    insert_raw(&conn, "u2", "t4", 3, false, false);

    // A second active row for the same owner must not.
    let err = try_insert_raw(&conn, "u1", "t5", 3, false, false).unwrap_err();
    assert!(err.to_string().contains("UNIQUE"), "unexpected error: {err}");
}

fn insert_raw(
    conn: &Connection,
    user: &str,
    uuid: &str,
    priority: u32,
    completed: bool,
    deleted: bool,
) {
    try_insert_raw(conn, user, uuid, priority, completed, deleted).unwrap();
}

fn try_insert_raw(
    conn: &Connection,
    user: &str,
    uuid: &str,
    priority: u32,
    completed: bool,
    deleted: bool,
) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "INSERT INTO tasks (uuid, user_id, title, priority, completed, deleted)
         VALUES (?1, ?2, 'row', ?3, ?4, ?5);",
        rusqlite::params![uuid, user, priority, completed as i64, deleted as i64],
    )
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'index' AND name = ?1
            );",
            [index_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "index {index_name} does not exist");
}
