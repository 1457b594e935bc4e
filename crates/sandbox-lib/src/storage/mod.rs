//! Transactional storage isolation
//!
//! Every test runs inside a savepoint on the single test connection. The
//! connection itself is reached through [`TransactionalConnection`] so the
//! embedded engine and a client/server engine are interchangeable.
//!
//! Schema changes are the documented hazard: on backends without
//! transactional DDL they commit the open transaction implicitly. The manager
//! does not intercept them, so a schema change inside a test breaks isolation
//! for that test and every later test on the same connection.

use crate::config::SandboxConfig;
use crate::primitives::{BackendKind, ConfigError};
use thiserror::Error;

pub mod isolation;
pub mod memory;
pub mod sqlite;
pub mod stack;

pub use isolation::TransactionalIsolationManager;
pub use memory::MemoryConnection;
pub use sqlite::SqliteConnection;
pub use stack::{SavepointFrame, SavepointStack};

/// Storage transaction errors
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Storage backend unreachable: {reason}")]
    BackendUnreachable { reason: String },

    #[error("Rollback requested but no transaction or savepoint is open")]
    EmptyStack,

    #[error("Savepoint '{name}' is not on the stack")]
    UnknownSavepoint { name: String },

    #[error("Savepoint '{name}' already exists on the stack")]
    DuplicateSavepoint { name: String },

    #[error("Invalid savepoint name '{name}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidSavepointName { name: String },

    #[error("Storage operation '{operation}' failed: {reason}")]
    Backend { operation: String, reason: String },

    #[error("SQLite statement failed: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },
}

/// What the backend can honor inside one open transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// SAVEPOINT / ROLLBACK TO / RELEASE nest arbitrarily
    pub nested_savepoints: bool,
    /// Schema changes are rolled back with the transaction
    pub transactional_ddl: bool,
    /// Autocommit can be switched off for the connection
    pub autocommit_control: bool,
}

impl BackendCapabilities {
    /// Typical capability profile of a backend family
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Embedded => Self {
                nested_savepoints: true,
                transactional_ddl: true,
                autocommit_control: true,
            },
            BackendKind::ClientServer => Self {
                nested_savepoints: true,
                transactional_ddl: false,
                autocommit_control: true,
            },
        }
    }

    /// Whether savepoint-based isolation is trustworthy on this backend
    pub fn supports_isolation(&self, require_transactional_ddl: bool) -> bool {
        self.nested_savepoints
            && self.autocommit_control
            && (self.transactional_ddl || !require_transactional_ddl)
    }
}

/// The single storage connection a test process owns
///
/// Savepoint names handed to these methods have already been validated as
/// plain identifiers by the [`SavepointStack`].
pub trait TransactionalConnection {
    /// Backend family of this connection
    fn backend(&self) -> BackendKind;

    /// Transactional features this connection can honor
    fn capabilities(&self) -> BackendCapabilities;

    /// Cheap liveness check
    fn ping(&self) -> Result<(), TransactionError>;

    /// Open a transaction (disables autocommit until rollback)
    fn begin(&self) -> Result<(), TransactionError>;

    /// Create a named savepoint inside the open transaction
    fn savepoint(&self, name: &str) -> Result<(), TransactionError>;

    /// Undo all writes since `name`, keeping `name` itself active
    fn rollback_to(&self, name: &str) -> Result<(), TransactionError>;

    /// Forget `name` and every savepoint created after it
    fn release(&self, name: &str) -> Result<(), TransactionError>;

    /// Abandon the whole transaction
    fn rollback(&self) -> Result<(), TransactionError>;
}

/// Open the connection selected by the configuration
pub fn connect(config: &SandboxConfig) -> Result<SqliteConnection, ConfigError> {
    match config.backend {
        BackendKind::Embedded => {
            let connection = match &config.database_path {
                Some(path) => SqliteConnection::open(path),
                None => SqliteConnection::open_in_memory(),
            };
            connection.map_err(|e| ConfigError::ValidationFailed {
                reason: e.to_string(),
            })
        }
        BackendKind::ClientServer => Err(ConfigError::UnsupportedBackend {
            backend: BackendKind::ClientServer,
        }),
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
