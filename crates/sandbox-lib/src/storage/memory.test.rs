use super::*;
use serde_json::json;

fn connection(kind: BackendKind) -> MemoryConnection {
    let conn = MemoryConnection::new(kind);
    conn.create_table("posts").unwrap();
    conn
}

#[test]
fn test_writes_outside_transaction_are_permanent() {
    let conn = connection(BackendKind::Embedded);
    conn.put("posts", "1", json!({"title": "hello"})).unwrap();
    assert!(conn.rollback().is_err());
    assert_eq!(conn.get("posts", "1"), Some(json!({"title": "hello"})));
}

#[test]
fn test_rollback_undoes_writes_in_reverse_order() {
    let conn = connection(BackendKind::Embedded);
    conn.put("posts", "1", json!("original")).unwrap();

    conn.begin().unwrap();
    conn.put("posts", "1", json!("edited")).unwrap();
    conn.put("posts", "2", json!("new")).unwrap();
    conn.delete("posts", "1").unwrap();
    conn.rollback().unwrap();

    assert_eq!(conn.get("posts", "1"), Some(json!("original")));
    assert_eq!(conn.get("posts", "2"), None);
    assert!(!conn.in_transaction());
}

#[test]
fn test_rollback_to_keeps_savepoint() {
    let conn = connection(BackendKind::Embedded);
    conn.begin().unwrap();
    conn.put("posts", "1", json!("before")).unwrap();
    conn.savepoint("step_two").unwrap();

    conn.put("posts", "2", json!("during")).unwrap();
    conn.rollback_to("step_two").unwrap();
    assert_eq!(conn.count("posts"), 1);

    conn.put("posts", "3", json!("again")).unwrap();
    conn.rollback_to("step_two").unwrap();
    assert_eq!(conn.keys("posts"), vec!["1".to_string()]);
}

#[test]
fn test_release_forgets_nested_savepoints() {
    let conn = connection(BackendKind::Embedded);
    conn.begin().unwrap();
    conn.savepoint("outer").unwrap();
    conn.savepoint("inner").unwrap();
    conn.release("outer").unwrap();

    assert!(matches!(
        conn.rollback_to("inner"),
        Err(TransactionError::UnknownSavepoint { .. })
    ));
}

#[test]
fn test_transactional_ddl_rolls_back_tables() {
    let conn = connection(BackendKind::Embedded);
    conn.begin().unwrap();
    conn.create_table("comments").unwrap();
    conn.drop_table("posts").unwrap();
    conn.rollback().unwrap();

    assert!(conn.has_table("posts"));
    assert!(!conn.has_table("comments"));
}

#[test]
fn test_client_server_ddl_commits_implicitly() {
    let conn = connection(BackendKind::ClientServer);
    conn.begin().unwrap();
    conn.savepoint("test_frame").unwrap();
    conn.put("posts", "1", json!("leaked")).unwrap();

    conn.create_table("comments").unwrap();

    assert!(!conn.in_transaction());
    assert!(matches!(
        conn.rollback_to("test_frame"),
        Err(TransactionError::UnknownSavepoint { .. })
    ));
    assert_eq!(conn.get("posts", "1"), Some(json!("leaked")));
}

#[test]
fn test_unreachable_connection() {
    let conn = connection(BackendKind::Embedded);
    conn.set_reachable(false);
    assert!(matches!(
        conn.ping(),
        Err(TransactionError::BackendUnreachable { .. })
    ));
    assert!(conn.begin().is_err());
}

#[test]
fn test_write_to_missing_table_fails() {
    let conn = MemoryConnection::new(BackendKind::Embedded);
    assert!(matches!(
        conn.put("nope", "1", json!(1)),
        Err(TransactionError::Backend { .. })
    ));
}

#[test]
fn test_truncate_is_journaled() {
    let conn = connection(BackendKind::Embedded);
    conn.put("posts", "1", json!(1)).unwrap();
    conn.put("posts", "2", json!(2)).unwrap();

    conn.begin().unwrap();
    assert_eq!(conn.truncate("posts").unwrap(), 2);
    assert_eq!(conn.count("posts"), 0);
    conn.rollback().unwrap();
    assert_eq!(conn.count("posts"), 2);
}
