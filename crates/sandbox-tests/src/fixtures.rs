//! Sandbox construction shared by the end-to-end tests

use crate::blog::{self, notification};
use anyhow::Result;
use sandbox_lib::testing::TempDatabase;
use sandbox_lib::{
    BackendKind, FunctionTable, Logger, MemoryConnection, Sandbox, SandboxConfig, SqliteConnection,
};
use serde_json::json;

/// Real implementations of the functions the blog calls
pub fn live_functions() -> FunctionTable {
    FunctionTable::new()
        .with("get_option", |args| {
            Ok(match args.first().and_then(|v| v.as_str()) {
                Some("blogname") => json!("Sandbox Blog"),
                _ => json!(null),
            })
        })
        .with("notify_subscribers", |args| {
            let id = args.first().and_then(|v| v.as_i64()).unwrap_or_default();
            let title = args.get(1).and_then(|v| v.as_str()).unwrap_or_default();
            Ok(notification(id, title))
        })
}

/// Configuration used by the end-to-end tests: unmatched HTTP is blocked
pub fn test_config() -> SandboxConfig {
    SandboxConfig {
        block_unmatched: true,
        ..SandboxConfig::default()
    }
}

/// In-memory SQLite sandbox with the blog schema installed
pub fn sqlite_sandbox() -> Result<Sandbox<SqliteConnection>> {
    let _ = Logger::init_for_tests();
    let connection = SqliteConnection::open_in_memory()?;
    blog::install(&connection)?;
    Ok(Sandbox::builder(connection)
        .config(test_config())
        .functions(live_functions())
        .build()?)
}

/// File-backed sandbox on `database`, which must already hold the schema
pub fn file_sandbox(database: &TempDatabase) -> Result<Sandbox<SqliteConnection>> {
    let _ = Logger::init_for_tests();
    let config = SandboxConfig {
        block_unmatched: true,
        ..database.config()
    };
    let connection = database.open()?;
    Ok(Sandbox::builder(connection)
        .config(config)
        .functions(live_functions())
        .build()?)
}

/// Sandbox over the in-process backend with a `posts` table
pub fn memory_sandbox(kind: BackendKind) -> Result<Sandbox<MemoryConnection>> {
    let _ = Logger::init_for_tests();
    let connection = MemoryConnection::new(kind);
    connection.create_table("posts")?;
    Ok(Sandbox::builder(connection).config(test_config()).build()?)
}
