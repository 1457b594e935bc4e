//! Unified mock registry
//!
//! One interception contract (configure, record, verify) shared by four
//! surfaces: named host functions, hook dispatch, outbound HTTP, and the
//! clock. Each surface translates its invocation shape into a
//! [`MockBehavior`] lookup plus an [`InvocationRecord`] append.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use thiserror::Error;

pub mod behavior;
pub mod clock;
pub mod function;
pub mod hook;
pub mod http;
pub mod pattern;
pub mod record;
pub mod registry;

pub use behavior::{BehaviorKind, Expectation, MockBehavior, MockHandle};
pub use clock::{CLOCK_SYMBOL, ClockInterceptor};
pub use function::FunctionInterceptor;
pub use hook::{HookCapture, HookInterceptor, HookRegistration};
pub use http::{HttpInterceptor, RecordedRequest, RequestDisposition};
pub use pattern::{UrlPattern, normalize_url};
pub use record::{InvocationRecord, Sequence};
pub use registry::MockRegistry;

/// Error configured on a mock with `and_throw`
///
/// Surfaces to host code exactly like a failure of the real operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ThrownError {
    pub message: String,
    pub code: Option<String>,
}

impl ThrownError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<&str> for ThrownError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ThrownError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Call-count mismatch found at verification time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Mock expectation failed for '{symbol}': expected {expected}, called {actual} time(s)")]
pub struct MockExpectationError {
    pub symbol: String,
    pub expected: Expectation,
    pub actual: usize,
}

/// Every expectation failure of one `verify_all` pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct VerificationError {
    pub failures: Vec<MockExpectationError>,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mock expectation(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

/// HTTP request with no matching rule while unmatched requests are blocked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unmocked {method} request to {url} was blocked")]
pub struct UnmockedRequestError {
    pub method: String,
    pub url: String,
}

/// Function called by name with neither a mock nor a real implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Call to undefined function '{name}'")]
pub struct UndefinedFunctionError {
    pub name: String,
}

/// URL pattern compilation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("URL pattern is empty")]
    Empty,

    #[error("URL pattern '{pattern}' has no host")]
    MissingHost { pattern: String },

    #[error("URL pattern '{pattern}' has more than one wildcard segment")]
    MultipleWildcards { pattern: String },

    #[error("URL pattern '{pattern}' mixes a wildcard into segment '{segment}'")]
    PartialWildcard { pattern: String, segment: String },

    #[error("URL pattern '{pattern}' has an invalid port '{port}'")]
    InvalidPort { pattern: String, port: String },
}

/// Clock interceptor errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("The clock is not frozen")]
    NotFrozen,

    #[error("Cannot parse '{input}' as a timestamp (expected YYYY-MM-DD HH:MM:SS or RFC 3339)")]
    InvalidTimestamp { input: String },

    #[error("Moving the clock from {from} by {by} leaves the representable range")]
    OutOfRange {
        from: DateTime<Utc>,
        by: TimeDelta,
    },
}
