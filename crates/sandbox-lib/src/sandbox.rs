//! Per-process test sandbox
//!
//! A [`Sandbox`] owns the single test connection, the mock registry and the
//! intercepting host services. Host code sees it only as [`HostServices`].
//!
//! Lifecycle: building the sandbox opens the root transaction once. Each test
//! nests its own savepoint in [`before_each`](Sandbox::before_each);
//! [`after_each`](Sandbox::after_each) then verifies every mock expectation,
//! rolls the test savepoint back and clears the registry, in that order, so an
//! unmet expectation is reported while the test's writes are still visible.

use crate::config::SandboxConfig;
use crate::host::{
    Clock, EventBus, FunctionDispatch, FunctionTable, HostServices, HttpTransport, LiveEventBus,
    LiveHttpTransport, SystemClock,
};
use crate::logger::Logger;
use crate::mocks::{
    ClockInterceptor, FunctionInterceptor, HookCapture, HookInterceptor, HttpInterceptor,
    MockHandle, MockRegistry, PatternError, VerificationError,
};
use crate::primitives::{BackendKind, ConfigError, LoggerError};
use crate::storage::{
    self, SqliteConnection, TransactionError, TransactionalConnection,
    TransactionalIsolationManager,
};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Cleanup routine for backends that cannot isolate with savepoints
pub type ReseedFn<C> = Box<dyn Fn(&C) -> anyhow::Result<()>>;

/// How storage writes are undone between tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationStrategy {
    /// Savepoint per test, rolled back at teardown
    Transactional,
    /// Caller-supplied delete-and-reseed routine after each test
    Reseed,
}

/// Sandbox lifecycle errors
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Expectation(#[from] VerificationError),

    #[error("{verification}\nStorage cleanup also failed: {cleanup}")]
    TeardownFailed {
        verification: VerificationError,
        cleanup: Box<SandboxError>,
    },

    #[error("Reseed routine failed: {0:#}")]
    Reseed(anyhow::Error),

    #[error(
        "The {backend:?} backend cannot isolate tests with savepoints and no reseed routine was supplied"
    )]
    NoIsolationStrategy { backend: BackendKind },

    #[error("Test '{name}' is still running")]
    TestAlreadyActive { name: String },

    #[error("No test is running")]
    NoActiveTest,

    #[error("Test '{name}' failed: {source:#}")]
    TestFailed {
        name: String,
        source: anyhow::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logger(#[from] LoggerError),

    #[error("Failed to build host services: {0:#}")]
    Services(anyhow::Error),
}

#[derive(Debug)]
struct ActiveTest {
    name: String,
    /// Savepoint of the test; absent under reseed isolation
    frame: Option<String>,
    started: Instant,
}

/// Builder for [`Sandbox`]; unset host services default to the live ones
pub struct SandboxBuilder<C: TransactionalConnection> {
    connection: C,
    config: SandboxConfig,
    functions: Option<Box<dyn FunctionDispatch>>,
    hooks: Option<Box<dyn EventBus>>,
    http: Option<Box<dyn HttpTransport>>,
    clock: Option<Box<dyn Clock>>,
    reseed: Option<ReseedFn<C>>,
}

impl<C: TransactionalConnection> SandboxBuilder<C> {
    pub fn config(mut self, config: SandboxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn functions(mut self, functions: impl FunctionDispatch + 'static) -> Self {
        self.functions = Some(Box::new(functions));
        self
    }

    pub fn hooks(mut self, hooks: impl EventBus + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    pub fn http(mut self, http: impl HttpTransport + 'static) -> Self {
        self.http = Some(Box::new(http));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Fallback cleanup used when the backend cannot isolate with savepoints
    pub fn reseed<F>(mut self, reseed: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<()> + 'static,
    {
        self.reseed = Some(Box::new(reseed));
        self
    }

    pub fn build(self) -> Result<Sandbox<C>, SandboxError> {
        let Self {
            connection,
            config,
            functions,
            hooks,
            http,
            clock,
            reseed,
        } = self;

        let backend = connection.backend();
        connection.ping()?;
        let mut manager = TransactionalIsolationManager::new(connection)
            .with_ddl_requirement(config.require_transactional_ddl);

        let (strategy, reseed) = if manager.is_available() {
            manager.begin_transaction()?;
            (IsolationStrategy::Transactional, None)
        } else {
            let reseed = reseed.ok_or(SandboxError::NoIsolationStrategy { backend })?;
            warn!(?backend, "Savepoint isolation unavailable, falling back to reseed cleanup");
            (IsolationStrategy::Reseed, Some(reseed))
        };

        let http = match http {
            Some(http) => http,
            None => Box::new(
                LiveHttpTransport::from_config(&config).map_err(SandboxError::Services)?,
            ),
        };

        let registry = MockRegistry::with_block_unmatched(config.block_unmatched);
        let functions = functions.unwrap_or_else(|| Box::new(FunctionTable::new()));
        let hooks = hooks.unwrap_or_else(|| Box::new(LiveEventBus::new()));
        let clock = clock.unwrap_or_else(|| Box::new(SystemClock));

        info!(?backend, ?strategy, block_unmatched = config.block_unmatched, "Sandbox ready");
        Ok(Sandbox {
            manager,
            strategy,
            reseed,
            functions: FunctionInterceptor::new(registry.clone(), functions),
            hooks: HookInterceptor::new(registry.clone(), hooks),
            http: HttpInterceptor::new(registry.clone(), http),
            clock: ClockInterceptor::new(registry.clone(), clock),
            registry,
            current: None,
        })
    }
}

/// Test context: isolated storage plus intercepting host services
pub struct Sandbox<C: TransactionalConnection> {
    manager: TransactionalIsolationManager<C>,
    strategy: IsolationStrategy,
    reseed: Option<ReseedFn<C>>,
    registry: MockRegistry,
    functions: FunctionInterceptor,
    hooks: HookInterceptor,
    http: HttpInterceptor,
    clock: ClockInterceptor,
    current: Option<ActiveTest>,
}

impl<C: TransactionalConnection> Sandbox<C> {
    pub fn builder(connection: C) -> SandboxBuilder<C> {
        SandboxBuilder {
            connection,
            config: SandboxConfig::default(),
            functions: None,
            hooks: None,
            http: None,
            clock: None,
            reseed: None,
        }
    }

    // ------------------------------------------------------------------
    // Test lifecycle
    // ------------------------------------------------------------------

    /// Start a test: push its savepoint
    pub fn before_each(&mut self, name: &str) -> Result<(), SandboxError> {
        if let Some(active) = &self.current {
            return Err(SandboxError::TestAlreadyActive {
                name: active.name.clone(),
            });
        }

        let frame = match self.strategy {
            IsolationStrategy::Transactional => Some(self.manager.begin_transaction()?),
            IsolationStrategy::Reseed => None,
        };
        debug!(test = name, savepoint = ?frame, "Test started");
        self.current = Some(ActiveTest {
            name: name.to_string(),
            frame,
            started: Instant::now(),
        });
        Ok(())
    }

    /// Finish a test: verify expectations, undo storage writes, clear mocks.
    ///
    /// Mocks are cleared even when verification or cleanup fails.
    pub fn after_each(&mut self) -> Result<(), SandboxError> {
        let test = self.current.take().ok_or(SandboxError::NoActiveTest)?;

        let verification = self.registry.verify_all();
        let cleanup = self.undo_writes(&test);
        self.registry.clear_all();

        debug!(
            test = %test.name,
            elapsed_ms = test.started.elapsed().as_millis() as u64,
            verified = verification.is_ok(),
            cleaned = cleanup.is_ok(),
            "Test finished"
        );

        match (verification, cleanup) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(verification), Ok(())) => Err(SandboxError::Expectation(verification)),
            (Ok(()), Err(cleanup)) => Err(cleanup),
            (Err(verification), Err(cleanup)) => Err(SandboxError::TeardownFailed {
                verification,
                cleanup: Box::new(cleanup),
            }),
        }
    }

    fn undo_writes(&mut self, test: &ActiveTest) -> Result<(), SandboxError> {
        match (&test.frame, &self.reseed) {
            (Some(frame), _) => {
                // Discard helper savepoints above the test frame, then pop it
                self.manager.rollback(Some(frame))?;
                self.manager.rollback(None)?;
                Ok(())
            }
            (None, Some(reseed)) => reseed(self.manager.connection()).map_err(SandboxError::Reseed),
            (None, None) => Ok(()),
        }
    }

    /// Run `body` between `before_each` and `after_each`.
    ///
    /// Teardown runs even if the body fails or panics; a panic resumes after
    /// teardown. A failing body takes precedence over teardown errors, which
    /// are logged.
    pub fn run_test<F>(&mut self, name: &str, body: F) -> Result<(), SandboxError>
    where
        F: FnOnce(&mut Self) -> anyhow::Result<()>,
    {
        self.before_each(name)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *self)));
        let teardown = self.after_each();

        match outcome {
            Ok(Ok(())) => teardown,
            Ok(Err(source)) => {
                if let Err(e) = teardown {
                    error!(test = name, error = %e, "Teardown failed after test failure");
                }
                Err(SandboxError::TestFailed {
                    name: name.to_string(),
                    source,
                })
            }
            Err(payload) => {
                if let Err(e) = teardown {
                    error!(test = name, error = %e, "Teardown failed after panic");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Roll back the root transaction and close the sandbox
    pub fn finish(mut self) -> Result<(), SandboxError> {
        let pending = if self.current.is_some() {
            self.after_each()
        } else {
            Ok(())
        };
        self.manager.end_transaction()?;
        pending
    }

    pub fn current_test(&self) -> Option<&str> {
        self.current.as_ref().map(|test| test.name.as_str())
    }

    pub fn strategy(&self) -> IsolationStrategy {
        self.strategy
    }

    // ------------------------------------------------------------------
    // Storage checkpoints inside a test
    // ------------------------------------------------------------------

    /// Push a checkpoint inside the running test
    pub fn create_savepoint(&mut self, name: Option<&str>) -> Result<String, SandboxError> {
        Ok(self.manager.create_savepoint(name)?)
    }

    /// Roll back to `name` (kept active) or pop the top frame
    pub fn rollback(&mut self, name: Option<&str>) -> Result<(), SandboxError> {
        Ok(self.manager.rollback(name)?)
    }

    pub fn isolation(&self) -> &TransactionalIsolationManager<C> {
        &self.manager
    }

    // ------------------------------------------------------------------
    // Mocks
    // ------------------------------------------------------------------

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    pub fn mock_function(&self, name: &str) -> MockHandle {
        self.registry.mock_function(name)
    }

    pub fn mock_hook(&self, hook: &str) -> MockHandle {
        self.registry.mock_hook(hook)
    }

    pub fn capture_hook(&self, hook: &str) -> HookCapture {
        self.registry.capture_hook(hook)
    }

    pub fn mock_http(&self, pattern: &str) -> Result<MockHandle, PatternError> {
        self.registry.mock_http(pattern)
    }

    pub fn mock_http_method(
        &self,
        method: &str,
        pattern: &str,
    ) -> Result<MockHandle, PatternError> {
        self.registry.mock_http_method(method, pattern)
    }

    /// Clock controls (freeze, advance, tick)
    pub fn time(&self) -> &ClockInterceptor {
        &self.clock
    }

    pub fn verify_all(&self) -> Result<(), VerificationError> {
        self.registry.verify_all()
    }
}

impl Sandbox<SqliteConnection> {
    /// Open the configured embedded database and build a sandbox with live services
    pub fn from_config(config: SandboxConfig) -> Result<Self, SandboxError> {
        config.validate()?;
        let connection = storage::connect(&config)?;
        Self::builder(connection).config(config).build()
    }

    /// Load configuration from the environment, initialize logging, and build
    pub fn from_env() -> Result<Self, SandboxError> {
        let config = SandboxConfig::load()?;
        match Logger::init(config.to_logger_config()) {
            Ok(_) | Err(LoggerError::AlreadyInitialized) => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_config(config)
    }
}

impl<C: TransactionalConnection> HostServices for Sandbox<C> {
    type Storage = C;

    fn storage(&self) -> &C {
        self.manager.connection()
    }

    fn functions(&self) -> &dyn FunctionDispatch {
        &self.functions
    }

    fn hooks(&self) -> &dyn EventBus {
        &self.hooks
    }

    fn http(&self) -> &dyn HttpTransport {
        &self.http
    }

    fn clock(&self) -> &dyn Clock {
        &self.clock
    }
}

impl<C: TransactionalConnection> Drop for Sandbox<C> {
    fn drop(&mut self) {
        if let Some(test) = self.current.take() {
            warn!(test = %test.name, "Sandbox dropped while a test was running");
            self.registry.clear_all();
        }
    }
}

#[cfg(test)]
mod tests {
    include!("sandbox.test.rs");
}
