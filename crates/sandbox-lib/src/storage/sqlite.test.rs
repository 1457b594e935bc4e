use super::*;

fn seeded() -> SqliteConnection {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT NOT NULL);")
        .unwrap();
    conn
}

fn count(conn: &SqliteConnection) -> i64 {
    conn.inner()
        .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_savepoint_round_trip() {
    let conn = seeded();
    conn.begin().unwrap();
    conn.savepoint("root").unwrap();
    conn.inner()
        .execute("INSERT INTO posts (title) VALUES (?1)", ["first"])
        .unwrap();

    conn.savepoint("nested").unwrap();
    conn.inner()
        .execute("INSERT INTO posts (title) VALUES (?1)", ["second"])
        .unwrap();
    assert_eq!(count(&conn), 2);

    conn.rollback_to("nested").unwrap();
    conn.release("nested").unwrap();
    assert_eq!(count(&conn), 1);

    conn.rollback().unwrap();
    assert_eq!(count(&conn), 0);
    assert!(conn.inner().is_autocommit());
}

#[test]
fn test_ddl_is_transactional() {
    let conn = seeded();
    conn.begin().unwrap();
    conn.execute_batch("CREATE TABLE comments (id INTEGER PRIMARY KEY);")
        .unwrap();
    conn.rollback().unwrap();

    let exists: i64 = conn
        .inner()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'comments'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 0);
}

#[test]
fn test_unknown_savepoint_is_an_error() {
    let conn = seeded();
    conn.begin().unwrap();
    assert!(matches!(
        conn.rollback_to("missing"),
        Err(TransactionError::Sqlite { .. })
    ));
}

#[test]
fn test_file_backed_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sandbox.db");
    let conn = SqliteConnection::open(&path).unwrap();

    assert_eq!(conn.path(), Some(path.as_path()));
    assert_eq!(conn.backend(), BackendKind::Embedded);
    assert!(conn.ping().is_ok());
}
