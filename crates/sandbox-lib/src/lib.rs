//! # sandbox Library
//!
//! Test sandbox for host applications that touch storage, hooks, outbound
//! HTTP and the clock.
//!
//! ## Core Modules
//!
//! - [`primitives`] - Foundation types, enums and errors
//! - [`logger`] - Structured logging through `tracing`
//! - [`config`] - Environment-driven configuration
//! - [`storage`] - Savepoint-based transactional isolation
//! - [`mocks`] - Unified mock registry and the four interceptors
//! - [`host`] - Service seam the host application is written against
//! - [`sandbox`] - Per-process test context tying it all together
//!
//! ## Quick Start
//!
//! ```no_run
//! use sandbox_lib::{HostServices, Sandbox, SandboxConfig};
//! use serde_json::json;
//!
//! let mut sandbox = Sandbox::from_config(SandboxConfig::default())?;
//! sandbox.run_test("greets the user", |sb| {
//!     sb.mock_function("current_user").and_return("ada").once();
//!     assert_eq!(sb.functions().call("current_user", &[])?, json!("ada"));
//!     Ok(())
//! })?;
//! # Ok::<(), sandbox_lib::SandboxError>(())
//! ```

pub mod config;
pub mod host;
pub mod logger;
pub mod mocks;
pub mod primitives;
pub mod sandbox;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use config::SandboxConfig;
pub use host::{
    Clock, EventBus, FunctionDispatch, FunctionTable, HookCallback, HostServices, HttpRequest,
    HttpResponse, HttpTransport, LiveHost,
};
pub use logger::Logger;
pub use mocks::{
    BehaviorKind, ClockError, Expectation, MockExpectationError, MockHandle, MockRegistry,
    ThrownError, UndefinedFunctionError, UnmockedRequestError, VerificationError,
};
pub use primitives::{BackendKind, ConfigError, LogFormat, LogLevel, LogOutput, LoggerError};
pub use sandbox::{IsolationStrategy, Sandbox, SandboxBuilder, SandboxError};
pub use storage::{
    MemoryConnection, SqliteConnection, TransactionError, TransactionalConnection,
    TransactionalIsolationManager,
};
