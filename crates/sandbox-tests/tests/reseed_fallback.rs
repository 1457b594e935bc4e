//! Delete-and-reseed cleanup when savepoints cannot be trusted

use anyhow::Result;
use sandbox_lib::{
    BackendKind, HostServices, IsolationStrategy, MemoryConnection, Sandbox, SandboxConfig,
    SandboxError,
};
use serde_json::json;

fn config() -> SandboxConfig {
    SandboxConfig {
        require_transactional_ddl: true,
        block_unmatched: true,
        ..SandboxConfig::default()
    }
}

fn connection() -> Result<MemoryConnection> {
    let connection = MemoryConnection::new(BackendKind::ClientServer);
    connection.create_table("posts")?;
    Ok(connection)
}

#[test]
fn test_unavailable_isolation_requires_a_reseed_routine() -> Result<()> {
    let result = Sandbox::builder(connection()?).config(config()).build();
    assert!(matches!(
        result,
        Err(SandboxError::NoIsolationStrategy {
            backend: BackendKind::ClientServer
        })
    ));
    Ok(())
}

#[test]
fn test_reseed_restores_fixtures_between_tests() -> Result<()> {
    let mut sandbox = Sandbox::builder(connection()?)
        .config(config())
        .reseed(|storage: &MemoryConnection| {
            storage.truncate("posts")?;
            storage.put("posts", "welcome", json!("Welcome post"))?;
            Ok(())
        })
        .build()?;
    assert_eq!(sandbox.strategy(), IsolationStrategy::Reseed);
    assert!(!sandbox.isolation().is_available());

    sandbox.run_test("edits fixtures", |sb| {
        sb.storage().delete("posts", "welcome")?;
        sb.storage().put("posts", "new", json!("New post"))?;
        Ok(())
    })?;

    sandbox.run_test("sees pristine fixtures", |sb| {
        assert_eq!(sb.storage().keys("posts"), vec!["welcome".to_string()]);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_reseed_failure_is_reported() -> Result<()> {
    let mut sandbox = Sandbox::builder(connection()?)
        .config(config())
        .reseed(|storage: &MemoryConnection| {
            storage.truncate("missing_table")?;
            storage.put("missing_table", "x", json!(1))?;
            Ok(())
        })
        .build()?;

    let err = sandbox.run_test("anything", |_| Ok(())).unwrap_err();
    assert!(matches!(err, SandboxError::Reseed(_)));
    Ok(())
}
