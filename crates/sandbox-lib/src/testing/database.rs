use crate::config::SandboxConfig;
use crate::primitives::BackendKind;
use crate::storage::{SqliteConnection, TransactionError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary database file with automatic cleanup
pub struct TempDatabase {
    /// Owning directory (removed on drop)
    pub temp_dir: TempDir,
    path: PathBuf,
}

impl TempDatabase {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("sandbox.sqlite3");
        Ok(Self { temp_dir, path })
    }

    /// Create the file and run `schema` on it outside any transaction
    pub fn with_schema(schema: &str) -> anyhow::Result<Self> {
        let database = Self::new()?;
        database.open()?.execute_batch(schema)?;
        Ok(database)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection to the file
    pub fn open(&self) -> Result<SqliteConnection, TransactionError> {
        SqliteConnection::open(&self.path)
    }

    /// Embedded-backend configuration pointing at this file
    pub fn config(&self) -> SandboxConfig {
        SandboxConfig {
            backend: BackendKind::Embedded,
            database_path: Some(self.path.clone()),
            ..SandboxConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    include!("database.test.rs");
}
