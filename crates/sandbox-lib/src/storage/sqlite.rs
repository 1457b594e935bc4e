use super::{BackendCapabilities, TransactionError, TransactionalConnection};
use crate::primitives::BackendKind;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Embedded file-based backend
///
/// Host code reaches the raw connection through [`inner`](Self::inner); all
/// of its writes land inside whatever savepoint is currently open.
pub struct SqliteConnection {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteConnection {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TransactionError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| TransactionError::BackendUnreachable {
            reason: format!("{}: {e}", path.display()),
        })?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, gone when the connection drops
    pub fn open_in_memory() -> Result<Self, TransactionError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TransactionError::BackendUnreachable {
                reason: e.to_string(),
            })?;
        Ok(Self { conn, path: None })
    }

    pub fn inner(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run one or more statements without parameters
    pub fn execute_batch(&self, sql: &str) -> Result<(), TransactionError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn run(&self, statement: &str) -> Result<(), TransactionError> {
        trace!(statement, "sqlite");
        self.conn.execute_batch(statement)?;
        Ok(())
    }
}

impl TransactionalConnection for SqliteConnection {
    fn backend(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn capabilities(&self) -> BackendCapabilities {
        // SQLite DDL is transactional and BEGIN always leaves autocommit
        BackendCapabilities::for_backend(BackendKind::Embedded)
    }

    fn ping(&self) -> Result<(), TransactionError> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| TransactionError::BackendUnreachable {
                reason: e.to_string(),
            })
    }

    fn begin(&self) -> Result<(), TransactionError> {
        self.run("BEGIN")
    }

    fn savepoint(&self, name: &str) -> Result<(), TransactionError> {
        self.run(&format!("SAVEPOINT {name}"))
    }

    fn rollback_to(&self, name: &str) -> Result<(), TransactionError> {
        self.run(&format!("ROLLBACK TO SAVEPOINT {name}"))
    }

    fn release(&self, name: &str) -> Result<(), TransactionError> {
        self.run(&format!("RELEASE SAVEPOINT {name}"))
    }

    fn rollback(&self) -> Result<(), TransactionError> {
        self.run("ROLLBACK")
    }
}

#[cfg(test)]
mod tests {
    include!("sqlite.test.rs");
}
