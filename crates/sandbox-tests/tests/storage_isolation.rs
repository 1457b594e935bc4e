//! Savepoint isolation against real SQLite and the in-process backend

use anyhow::Result;
use sandbox_lib::testing::TempDatabase;
use sandbox_lib::{BackendKind, HostServices, SandboxError, TransactionError};
use sandbox_tests::blog::{self, Blog};
use sandbox_tests::{file_sandbox, memory_sandbox, sqlite_sandbox};
use serde_json::json;

fn titles(conn: &rusqlite::Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT title FROM posts ORDER BY id")?;
    let titles = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(titles)
}

#[test]
fn test_file_database_is_untouched_after_tests() -> Result<()> {
    let database = TempDatabase::new()?;
    blog::install(&database.open()?)?;

    {
        let mut sandbox = file_sandbox(&database)?;
        for round in 0..3 {
            sandbox.run_test(&format!("round {round}"), |sb| {
                let blog = Blog::new(&*sb);
                assert_eq!(blog.count()?, 0);
                blog.create_post(&format!("Post {round}"), "")?;
                assert_eq!(blog.count()?, 1);
                Ok(())
            })?;
        }
        sandbox.finish()?;
    }

    // A separate connection sees nothing that was written under the sandbox
    let observer = database.open()?;
    assert!(titles(observer.inner())?.is_empty());
    Ok(())
}

#[test]
fn test_named_rollback_is_idempotent() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("checkpoints", |sb| {
        Blog::new(&*sb).create_post("before", "")?;
        let checkpoint = sb.create_savepoint(Some("before_step_two"))?;

        Blog::new(&*sb).create_post("during", "")?;
        sb.rollback(Some(&checkpoint))?;
        let first = titles(sb.storage().inner())?;

        sb.rollback(Some(&checkpoint))?;
        let second = titles(sb.storage().inner())?;

        assert_eq!(first, vec!["before".to_string()]);
        assert_eq!(first, second);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_rollback_on_empty_stack_is_an_error() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    // No test is running, so the only frame is the root transaction
    sandbox.rollback(None)?;
    let err = sandbox.rollback(None).unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Transaction(TransactionError::EmptyStack)
    ));
    Ok(())
}

#[test]
fn test_schema_changes_roll_back_on_sqlite() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("adds a table", |sb| {
        sb.storage().execute_batch("CREATE TABLE drafts (id INTEGER);")?;
        Ok(())
    })?;

    let exists: i64 = sandbox.storage().inner().query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE name = 'drafts'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(exists, 0);
    Ok(())
}

#[test]
fn test_schema_change_breaks_isolation_on_client_server_backend() -> Result<()> {
    let mut sandbox = memory_sandbox(BackendKind::ClientServer)?;

    // Writes before the schema change are committed by it
    let result = sandbox.run_test("changes schema", |sb| {
        sb.storage().put("posts", "1", json!("committed"))?;
        sb.storage().create_table("drafts")?;
        Ok(())
    });

    assert!(matches!(result, Err(SandboxError::Transaction(_))));
    assert_eq!(sandbox.storage().get("posts", "1"), Some(json!("committed")));
    assert!(sandbox.storage().has_table("drafts"));
    assert!(!sandbox.storage().in_transaction());
    Ok(())
}

#[test]
fn test_in_process_backend_isolates_data_writes() -> Result<()> {
    let mut sandbox = memory_sandbox(BackendKind::ClientServer)?;
    sandbox.run_test("writes", |sb| {
        sb.storage().put("posts", "1", json!("draft"))?;
        Ok(())
    })?;
    sandbox.run_test("reads", |sb| {
        assert_eq!(sb.storage().get("posts", "1"), None);
        Ok(())
    })?;
    Ok(())
}
