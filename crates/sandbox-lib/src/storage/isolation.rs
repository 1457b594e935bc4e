use super::{SavepointFrame, SavepointStack, TransactionError, TransactionalConnection};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Owns the test connection's transaction lifecycle.
///
/// The first `begin_transaction` opens the root transaction; every later call
/// nests a savepoint. Rollbacks always work relative to the top of the stack,
/// so helpers that push their own checkpoints compose with the per-test frame.
pub struct TransactionalIsolationManager<C: TransactionalConnection> {
    connection: C,
    stack: SavepointStack,
    require_transactional_ddl: bool,
}

impl<C: TransactionalConnection> TransactionalIsolationManager<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            stack: SavepointStack::new(),
            require_transactional_ddl: false,
        }
    }

    /// Report the backend as unavailable unless schema changes are transactional
    pub fn with_ddl_requirement(mut self, required: bool) -> Self {
        self.require_transactional_ddl = required;
        self
    }

    /// Open the root transaction, or nest a savepoint if one is already open.
    /// Returns the name of the pushed frame.
    pub fn begin_transaction(&mut self) -> Result<String, TransactionError> {
        self.connection
            .ping()
            .map_err(|e| TransactionError::BackendUnreachable {
                reason: e.to_string(),
            })?;

        if self.stack.is_empty() {
            self.open_root(None)
        } else {
            self.push_savepoint(None)
        }
    }

    /// Push a checkpoint at any depth (e.g. "state before step two")
    pub fn create_savepoint(&mut self, name: Option<&str>) -> Result<String, TransactionError> {
        if self.stack.is_empty() {
            self.open_root(name)
        } else {
            self.push_savepoint(name)
        }
    }

    /// Roll back storage writes.
    ///
    /// Without a name the top frame is rolled back and popped. With a name the
    /// storage returns to that frame, every frame above it is discarded, and
    /// the named frame stays active so the same checkpoint can be reused.
    pub fn rollback(&mut self, name: Option<&str>) -> Result<(), TransactionError> {
        let started = Instant::now();

        match name {
            None => {
                let top = self.stack.top().cloned().ok_or(TransactionError::EmptyStack)?;
                if top.depth == 0 {
                    self.connection.rollback()?;
                } else {
                    self.connection.rollback_to(&top.name)?;
                    self.connection.release(&top.name)?;
                }
                self.stack.pop();
                debug!(savepoint = %top.name, depth = top.depth, "Rolled back and popped frame");
            }
            Some(name) => {
                if self.stack.is_empty() {
                    return Err(TransactionError::EmptyStack);
                }
                let frame = self.stack.find(name).cloned().ok_or_else(|| {
                    TransactionError::UnknownSavepoint {
                        name: name.to_string(),
                    }
                })?;
                self.connection.rollback_to(&frame.name)?;
                let discarded = self.stack.truncate_above(frame.depth);
                debug!(
                    savepoint = %frame.name,
                    depth = frame.depth,
                    discarded,
                    "Rolled back to named frame"
                );
            }
        }

        trace!(elapsed_us = started.elapsed().as_micros() as u64, "Rollback finished");
        Ok(())
    }

    /// Abandon the root transaction at connection teardown
    pub fn end_transaction(&mut self) -> Result<(), TransactionError> {
        if self.stack.is_empty() {
            return Ok(());
        }

        let depth = self.stack.len();
        self.stack.clear();
        self.connection.rollback()?;
        debug!(depth, "Root transaction rolled back");
        Ok(())
    }

    /// True while any frame is on the stack
    pub fn is_transaction_active(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Capability probe: can this backend isolate tests with savepoints?
    ///
    /// `false` is not an error; it tells the runner to fall back to
    /// delete-and-reseed cleanup.
    pub fn is_available(&self) -> bool {
        if let Err(e) = self.connection.ping() {
            debug!(error = %e, "Isolation unavailable: backend unreachable");
            return false;
        }

        let capabilities = self.connection.capabilities();
        let available = capabilities.supports_isolation(self.require_transactional_ddl);
        if !available {
            debug!(?capabilities, backend = ?self.connection.backend(), "Isolation unavailable");
        }
        available
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current_frame(&self) -> Option<&SavepointFrame> {
        self.stack.top()
    }

    pub fn frames(&self) -> &[SavepointFrame] {
        self.stack.frames()
    }

    fn open_root(&mut self, name: Option<&str>) -> Result<String, TransactionError> {
        let name = self.stack.reserve_name(name)?;
        self.connection.begin()?;
        if let Err(e) = self.connection.savepoint(&name) {
            // Leave the connection in autocommit rather than half-open
            let _ = self.connection.rollback();
            return Err(e);
        }
        self.stack.push(name.clone());
        debug!(savepoint = %name, backend = ?self.connection.backend(), "Opened root transaction");
        Ok(name)
    }

    fn push_savepoint(&mut self, name: Option<&str>) -> Result<String, TransactionError> {
        let name = self.stack.reserve_name(name)?;
        self.connection.savepoint(&name)?;
        let depth = self.stack.push(name.clone()).depth;
        debug!(savepoint = %name, depth, "Created savepoint");
        Ok(name)
    }
}

impl<C: TransactionalConnection> Drop for TransactionalIsolationManager<C> {
    fn drop(&mut self) {
        if let Err(e) = self.end_transaction() {
            warn!(error = %e, "Failed to roll back root transaction on teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    include!("isolation.test.rs");
}
