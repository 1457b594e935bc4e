use super::*;
use crate::primitives::BackendKind;
use crate::storage::{BackendCapabilities, MemoryConnection, SqliteConnection};
use serde_json::json;

fn memory_manager(kind: BackendKind) -> TransactionalIsolationManager<MemoryConnection> {
    let conn = MemoryConnection::new(kind);
    conn.create_table("posts").unwrap();
    TransactionalIsolationManager::new(conn)
}

#[test]
fn test_first_begin_opens_root() {
    let mut manager = memory_manager(BackendKind::Embedded);
    assert!(!manager.is_transaction_active());

    let root = manager.begin_transaction().unwrap();
    assert!(manager.is_transaction_active());
    assert_eq!(manager.depth(), 1);
    assert_eq!(manager.current_frame().unwrap().name, root);
    assert!(manager.connection().in_transaction());

    let nested = manager.begin_transaction().unwrap();
    assert_ne!(root, nested);
    assert_eq!(manager.current_frame().unwrap().depth, 1);
}

#[test]
fn test_writes_discarded_after_test_rollback() {
    let mut manager = memory_manager(BackendKind::Embedded);
    manager.begin_transaction().unwrap();

    for _ in 0..3 {
        manager.begin_transaction().unwrap();
        manager
            .connection()
            .put("posts", "1", json!({"title": "draft"}))
            .unwrap();
        assert_eq!(manager.connection().count("posts"), 1);
        manager.rollback(None).unwrap();
        assert_eq!(manager.connection().count("posts"), 0);
    }
    assert_eq!(manager.depth(), 1);
}

#[test]
fn test_named_rollback_is_idempotent() {
    let mut manager = memory_manager(BackendKind::Embedded);
    manager.begin_transaction().unwrap();
    manager.connection().put("posts", "1", json!("kept")).unwrap();
    manager.create_savepoint(Some("before_step_two")).unwrap();

    manager.connection().put("posts", "2", json!("step two")).unwrap();
    manager.rollback(Some("before_step_two")).unwrap();
    let first = manager.connection().keys("posts");

    manager.rollback(Some("before_step_two")).unwrap();
    let second = manager.connection().keys("posts");

    assert_eq!(first, vec!["1".to_string()]);
    assert_eq!(first, second);
    assert_eq!(manager.current_frame().unwrap().name, "before_step_two");
}

#[test]
fn test_named_rollback_discards_frames_above() {
    let mut manager = memory_manager(BackendKind::Embedded);
    manager.begin_transaction().unwrap();
    let test_frame = manager.begin_transaction().unwrap();
    manager.create_savepoint(Some("helper_a")).unwrap();
    manager.create_savepoint(Some("helper_b")).unwrap();
    assert_eq!(manager.depth(), 4);

    manager.rollback(Some(&test_frame)).unwrap();
    assert_eq!(manager.depth(), 2);
    assert!(manager.frames().iter().all(|f| !f.name.starts_with("helper")));
}

#[test]
fn test_rollback_on_empty_stack_fails_fast() {
    let mut manager = memory_manager(BackendKind::Embedded);
    assert!(matches!(
        manager.rollback(None),
        Err(TransactionError::EmptyStack)
    ));
    assert!(matches!(
        manager.rollback(Some("anything")),
        Err(TransactionError::EmptyStack)
    ));
}

#[test]
fn test_rollback_to_unknown_frame() {
    let mut manager = memory_manager(BackendKind::Embedded);
    manager.begin_transaction().unwrap();
    assert!(matches!(
        manager.rollback(Some("never_created")),
        Err(TransactionError::UnknownSavepoint { .. })
    ));
}

#[test]
fn test_unreachable_backend_fails_begin() {
    let mut manager = memory_manager(BackendKind::Embedded);
    manager.connection().set_reachable(false);

    assert!(matches!(
        manager.begin_transaction(),
        Err(TransactionError::BackendUnreachable { .. })
    ));
    assert!(!manager.is_transaction_active());
    assert!(!manager.is_available());
}

#[test]
fn test_is_available_follows_capabilities() {
    assert!(memory_manager(BackendKind::Embedded).is_available());
    assert!(memory_manager(BackendKind::ClientServer).is_available());
    assert!(
        !memory_manager(BackendKind::ClientServer)
            .with_ddl_requirement(true)
            .is_available()
    );

    let no_autocommit = MemoryConnection::new(BackendKind::ClientServer).with_capabilities(
        BackendCapabilities {
            nested_savepoints: true,
            transactional_ddl: false,
            autocommit_control: false,
        },
    );
    assert!(!TransactionalIsolationManager::new(no_autocommit).is_available());
}

#[test]
fn test_schema_change_breaks_isolation_on_client_server() {
    let mut manager = memory_manager(BackendKind::ClientServer);
    manager.begin_transaction().unwrap();
    manager.begin_transaction().unwrap();
    manager.connection().put("posts", "1", json!("leaks")).unwrap();
    manager.connection().create_table("comments").unwrap();

    assert!(manager.rollback(None).is_err());
    assert_eq!(manager.connection().get("posts", "1"), Some(json!("leaks")));
}

#[test]
fn test_end_transaction_pops_root() {
    let mut manager = memory_manager(BackendKind::Embedded);
    manager.begin_transaction().unwrap();
    manager.begin_transaction().unwrap();
    manager.connection().put("posts", "1", json!(1)).unwrap();

    manager.end_transaction().unwrap();
    assert!(!manager.is_transaction_active());
    assert_eq!(manager.connection().count("posts"), 0);
    assert!(manager.end_transaction().is_ok());
}

#[test]
fn test_create_savepoint_on_empty_stack_opens_root() {
    let mut manager = memory_manager(BackendKind::Embedded);
    let name = manager.create_savepoint(Some("fixture_state")).unwrap();
    assert_eq!(name, "fixture_state");
    assert_eq!(manager.current_frame().unwrap().depth, 0);
    assert!(manager.connection().in_transaction());
}

#[test]
fn test_sqlite_isolation_between_tests() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT);")
        .unwrap();
    let mut manager = TransactionalIsolationManager::new(conn);
    manager.begin_transaction().unwrap();

    let count = |manager: &TransactionalIsolationManager<SqliteConnection>| -> i64 {
        manager
            .connection()
            .inner()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap()
    };

    manager.begin_transaction().unwrap();
    manager
        .connection()
        .inner()
        .execute("INSERT INTO posts (title) VALUES ('test a')", [])
        .unwrap();
    assert_eq!(count(&manager), 1);
    manager.rollback(None).unwrap();

    manager.begin_transaction().unwrap();
    assert_eq!(count(&manager), 0);
    manager.rollback(None).unwrap();
}

#[test]
fn test_sqlite_named_rollback_idempotent() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT);")
        .unwrap();
    let mut manager = TransactionalIsolationManager::new(conn);
    manager.begin_transaction().unwrap();
    manager.create_savepoint(Some("checkpoint")).unwrap();

    let titles = |manager: &TransactionalIsolationManager<SqliteConnection>| -> Vec<String> {
        let mut stmt = manager
            .connection()
            .inner()
            .prepare("SELECT title FROM posts ORDER BY id")
            .unwrap();
        let rows = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        rows
    };

    manager
        .connection()
        .inner()
        .execute("INSERT INTO posts (title) VALUES ('discard me')", [])
        .unwrap();
    manager.rollback(Some("checkpoint")).unwrap();
    let first = titles(&manager);
    manager.rollback(Some("checkpoint")).unwrap();
    let second = titles(&manager);

    assert!(first.is_empty());
    assert_eq!(first, second);
}
