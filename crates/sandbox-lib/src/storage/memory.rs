//! In-process table store with an undo journal
//!
//! Models either backend family's transactional behavior without a database
//! server, including the client/server hazard where a schema change
//! implicitly commits the open transaction.

use super::{BackendCapabilities, TransactionError, TransactionalConnection};
use crate::primitives::BackendKind;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use tracing::{trace, warn};

type Table = BTreeMap<String, Value>;

/// Inverse of one write, applied when rolling back
#[derive(Debug, Clone)]
enum UndoEntry {
    Row {
        table: String,
        key: String,
        previous: Option<Value>,
    },
    CreatedTable {
        table: String,
    },
    DroppedTable {
        table: String,
        rows: Table,
    },
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, Table>,
    in_transaction: bool,
    journal: Vec<UndoEntry>,
    /// (savepoint name, journal length when it was created)
    savepoints: Vec<(String, usize)>,
}

impl MemoryState {
    fn undo_to(&mut self, mark: usize) {
        while self.journal.len() > mark {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                UndoEntry::Row {
                    table,
                    key,
                    previous,
                } => {
                    if let Some(rows) = self.tables.get_mut(&table) {
                        match previous {
                            Some(value) => {
                                rows.insert(key, value);
                            }
                            None => {
                                rows.remove(&key);
                            }
                        }
                    }
                }
                UndoEntry::CreatedTable { table } => {
                    self.tables.remove(&table);
                }
                UndoEntry::DroppedTable { table, rows } => {
                    self.tables.insert(table, rows);
                }
            }
        }
    }

    fn savepoint_position(&self, name: &str) -> Option<usize> {
        self.savepoints.iter().rposition(|(sp, _)| sp == name)
    }

    fn journal(&mut self, entry: UndoEntry) {
        if self.in_transaction {
            self.journal.push(entry);
        }
    }
}

/// In-memory connection implementing the transactional contract
pub struct MemoryConnection {
    kind: BackendKind,
    capabilities: BackendCapabilities,
    reachable: Cell<bool>,
    state: RefCell<MemoryState>,
}

impl MemoryConnection {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            capabilities: BackendCapabilities::for_backend(kind),
            reachable: Cell::new(true),
            state: RefCell::new(MemoryState::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Simulate losing (or regaining) the backend
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.set(reachable);
    }

    pub fn in_transaction(&self) -> bool {
        self.state.borrow().in_transaction
    }

    /// Schema change. Commits the open transaction first when the backend
    /// lacks transactional DDL.
    pub fn create_table(&self, table: &str) -> Result<(), TransactionError> {
        self.before_ddl("create_table");
        let mut state = self.state.borrow_mut();
        if state.tables.contains_key(table) {
            return Err(backend_error(
                "create_table",
                format!("table '{table}' already exists"),
            ));
        }
        state.tables.insert(table.to_string(), Table::new());
        state.journal(UndoEntry::CreatedTable {
            table: table.to_string(),
        });
        Ok(())
    }

    pub fn drop_table(&self, table: &str) -> Result<(), TransactionError> {
        self.before_ddl("drop_table");
        let mut state = self.state.borrow_mut();
        let rows = state
            .tables
            .remove(table)
            .ok_or_else(|| backend_error("drop_table", format!("no such table: {table}")))?;
        state.journal(UndoEntry::DroppedTable {
            table: table.to_string(),
            rows,
        });
        Ok(())
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.borrow().tables.contains_key(table)
    }

    /// Insert or replace a row, returning the previous value
    pub fn put(
        &self,
        table: &str,
        key: &str,
        value: Value,
    ) -> Result<Option<Value>, TransactionError> {
        let mut state = self.state.borrow_mut();
        let rows = state
            .tables
            .get_mut(table)
            .ok_or_else(|| backend_error("put", format!("no such table: {table}")))?;
        let previous = rows.insert(key.to_string(), value);
        state.journal(UndoEntry::Row {
            table: table.to_string(),
            key: key.to_string(),
            previous: previous.clone(),
        });
        Ok(previous)
    }

    pub fn get(&self, table: &str, key: &str) -> Option<Value> {
        self.state
            .borrow()
            .tables
            .get(table)
            .and_then(|rows| rows.get(key).cloned())
    }

    pub fn delete(&self, table: &str, key: &str) -> Result<Option<Value>, TransactionError> {
        let mut state = self.state.borrow_mut();
        let rows = state
            .tables
            .get_mut(table)
            .ok_or_else(|| backend_error("delete", format!("no such table: {table}")))?;
        let previous = rows.remove(key);
        if previous.is_some() {
            state.journal(UndoEntry::Row {
                table: table.to_string(),
                key: key.to_string(),
                previous: previous.clone(),
            });
        }
        Ok(previous)
    }

    /// Delete every row of a table (used by reseed cleanup)
    pub fn truncate(&self, table: &str) -> Result<usize, TransactionError> {
        let keys = self.keys(table);
        for key in &keys {
            self.delete(table, key)?;
        }
        Ok(keys.len())
    }

    pub fn keys(&self, table: &str) -> Vec<String> {
        self.state
            .borrow()
            .tables
            .get(table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.state
            .borrow()
            .tables
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    fn before_ddl(&self, operation: &str) {
        let mut state = self.state.borrow_mut();
        if state.in_transaction && !self.capabilities.transactional_ddl {
            warn!(
                operation,
                savepoints = state.savepoints.len(),
                "Schema change implicitly committed the open transaction"
            );
            state.journal.clear();
            state.savepoints.clear();
            state.in_transaction = false;
        }
    }

    fn require_reachable(&self, operation: &str) -> Result<(), TransactionError> {
        if self.reachable.get() {
            Ok(())
        } else {
            Err(backend_error(operation, "connection lost".to_string()))
        }
    }
}

impl TransactionalConnection for MemoryConnection {
    fn backend(&self) -> BackendKind {
        self.kind
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn ping(&self) -> Result<(), TransactionError> {
        if self.reachable.get() {
            Ok(())
        } else {
            Err(TransactionError::BackendUnreachable {
                reason: "memory backend marked unreachable".to_string(),
            })
        }
    }

    fn begin(&self) -> Result<(), TransactionError> {
        self.require_reachable("begin")?;
        let mut state = self.state.borrow_mut();
        if state.in_transaction {
            return Err(backend_error(
                "begin",
                "a transaction is already open".to_string(),
            ));
        }
        state.in_transaction = true;
        state.journal.clear();
        state.savepoints.clear();
        trace!("memory: BEGIN");
        Ok(())
    }

    fn savepoint(&self, name: &str) -> Result<(), TransactionError> {
        self.require_reachable("savepoint")?;
        let mut state = self.state.borrow_mut();
        if !state.in_transaction {
            return Err(backend_error("savepoint", "no open transaction".to_string()));
        }
        // Re-using a name replaces the older savepoint
        if let Some(position) = state.savepoint_position(name) {
            state.savepoints.remove(position);
        }
        let mark = state.journal.len();
        state.savepoints.push((name.to_string(), mark));
        trace!(savepoint = name, mark, "memory: SAVEPOINT");
        Ok(())
    }

    fn rollback_to(&self, name: &str) -> Result<(), TransactionError> {
        self.require_reachable("rollback_to")?;
        let mut state = self.state.borrow_mut();
        let position =
            state
                .savepoint_position(name)
                .ok_or_else(|| TransactionError::UnknownSavepoint {
                    name: name.to_string(),
                })?;
        let mark = state.savepoints[position].1;
        state.undo_to(mark);
        state.savepoints.truncate(position + 1);
        trace!(savepoint = name, mark, "memory: ROLLBACK TO");
        Ok(())
    }

    fn release(&self, name: &str) -> Result<(), TransactionError> {
        self.require_reachable("release")?;
        let mut state = self.state.borrow_mut();
        let position =
            state
                .savepoint_position(name)
                .ok_or_else(|| TransactionError::UnknownSavepoint {
                    name: name.to_string(),
                })?;
        state.savepoints.truncate(position);
        trace!(savepoint = name, "memory: RELEASE");
        Ok(())
    }

    fn rollback(&self) -> Result<(), TransactionError> {
        self.require_reachable("rollback")?;
        let mut state = self.state.borrow_mut();
        if !state.in_transaction {
            return Err(backend_error("rollback", "no open transaction".to_string()));
        }
        state.undo_to(0);
        state.savepoints.clear();
        state.in_transaction = false;
        trace!("memory: ROLLBACK");
        Ok(())
    }
}

fn backend_error(operation: &str, reason: String) -> TransactionError {
    TransactionError::Backend {
        operation: operation.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    include!("memory.test.rs");
}
