use super::record::{InvocationRecord, Sequence};
use super::registry::{MockKey, RegistryState};
use super::{MockExpectationError, ThrownError};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Computes a return value from the intercepted call's arguments
pub type Callable = Rc<dyn Fn(&[Value]) -> Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    Fixed,
    Computed,
    Sequential,
    Error,
    Passthrough,
}

#[derive(Clone)]
enum Payload {
    Value(Value),
    Callable(Callable),
    Queue(VecDeque<Value>),
    Error(ThrownError),
    None,
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Payload::Callable(_) => f.write_str("Callable(..)"),
            Payload::Queue(queue) => f.debug_tuple("Queue").field(queue).finish(),
            Payload::Error(error) => f.debug_tuple("Error").field(error).finish(),
            Payload::None => f.write_str("None"),
        }
    }
}

/// Call-count constraint. Absent bounds mean unconstrained.
///
/// `exact` excludes `min`/`max`; when it is set both mirror it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expectation {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub exact: Option<usize>,
}

impl Expectation {
    pub fn exactly(count: usize) -> Self {
        Self {
            min: Some(count),
            max: Some(count),
            exact: Some(count),
        }
    }

    /// Raise the lower bound, dropping any exact count
    pub fn with_min(self, count: usize) -> Self {
        let max = if self.exact.is_some() { None } else { self.max };
        Self {
            min: Some(count),
            max,
            exact: None,
        }
    }

    /// Cap the upper bound, dropping any exact count
    pub fn with_max(self, count: usize) -> Self {
        let min = if self.exact.is_some() { None } else { self.min };
        Self {
            min,
            max: Some(count),
            exact: None,
        }
    }

    pub fn is_constrained(&self) -> bool {
        self.min.is_some() || self.max.is_some() || self.exact.is_some()
    }

    pub fn is_satisfied_by(&self, actual: usize) -> bool {
        if let Some(exact) = self.exact {
            return actual == exact;
        }
        self.min.is_none_or(|min| actual >= min) && self.max.is_none_or(|max| actual <= max)
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.exact, self.min, self.max) {
            (Some(0), _, _) => write!(f, "never"),
            (Some(exact), _, _) => write!(f, "exactly {exact}"),
            (None, Some(min), Some(max)) => write!(f, "between {min} and {max}"),
            (None, Some(min), None) => write!(f, "at least {min}"),
            (None, None, Some(max)) => write!(f, "at most {max}"),
            (None, None, None) => write!(f, "any number of calls"),
        }
    }
}

/// Rule set attached to one intercepted symbol
#[derive(Debug)]
pub struct MockBehavior {
    symbol: String,
    kind: BehaviorKind,
    payload: Payload,
    call_count: usize,
    expectation: Expectation,
    enabled: bool,
    history: Vec<InvocationRecord>,
}

/// Owned copy of what one invocation should do, taken so no borrow is held
/// while computed callables or the real implementation run
enum Step {
    Return(Value),
    Compute(Callable),
    Throw(ThrownError),
    Passthrough,
}

impl MockBehavior {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: BehaviorKind::Fixed,
            payload: Payload::Value(Value::Null),
            call_count: 0,
            expectation: Expectation::default(),
            enabled: true,
            history: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }

    pub fn call_count(&self) -> usize {
        self.call_count
    }

    pub fn expectation(&self) -> Expectation {
        self.expectation
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn history(&self) -> &[InvocationRecord] {
        &self.history
    }

    fn configure(&mut self, kind: BehaviorKind, payload: Payload) {
        self.kind = kind;
        self.payload = payload;
    }

    /// Compare the call count against the expectation
    pub fn verify(&self) -> Result<(), MockExpectationError> {
        if !self.expectation.is_constrained() || self.expectation.is_satisfied_by(self.call_count)
        {
            return Ok(());
        }
        Err(MockExpectationError {
            symbol: self.symbol.clone(),
            expected: self.expectation,
            actual: self.call_count,
        })
    }

    fn next_step(&mut self) -> Step {
        match &mut self.payload {
            Payload::Value(value) => Step::Return(value.clone()),
            Payload::Callable(callable) => Step::Compute(Rc::clone(callable)),
            Payload::Error(error) => Step::Throw(error.clone()),
            Payload::None => Step::Passthrough,
            Payload::Queue(queue) => {
                // The last queued value is sticky once the rest are consumed
                let value = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                Step::Return(value.unwrap_or(Value::Null))
            }
        }
    }
}

/// Shared, fluent handle on one registered [`MockBehavior`]
///
/// Configuration follows last-write-wins: setting a fixed return after a
/// thrown error simply replaces it.
#[derive(Clone)]
pub struct MockHandle {
    inner: Rc<RefCell<MockBehavior>>,
    key: MockKey,
    registry: Weak<RefCell<RegistryState>>,
    sequence: Sequence,
}

impl fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandle")
            .field("key", &self.key)
            .field("behavior", &self.inner.borrow())
            .finish()
    }
}

impl MockHandle {
    pub(crate) fn new(
        behavior: MockBehavior,
        key: MockKey,
        registry: Weak<RefCell<RegistryState>>,
        sequence: Sequence,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(behavior)),
            key,
            registry,
            sequence,
        }
    }

    // ------------------------------------------------------------------
    // Behavior configuration
    // ------------------------------------------------------------------

    /// Always return `value`
    pub fn and_return(&self, value: impl Into<Value>) -> &Self {
        self.inner
            .borrow_mut()
            .configure(BehaviorKind::Fixed, Payload::Value(value.into()));
        self
    }

    /// Compute the return value from the call arguments
    pub fn and_return_using<F>(&self, compute: F) -> &Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.inner
            .borrow_mut()
            .configure(BehaviorKind::Computed, Payload::Callable(Rc::new(compute)));
        self
    }

    /// Return queued values one per call; the last one repeats once exhausted
    pub fn and_return_consecutive<I, V>(&self, values: I) -> &Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let queue = values.into_iter().map(Into::into).collect();
        self.inner
            .borrow_mut()
            .configure(BehaviorKind::Sequential, Payload::Queue(queue));
        self
    }

    /// Fail every call as if the real operation failed
    pub fn and_throw(&self, error: impl Into<ThrownError>) -> &Self {
        self.inner
            .borrow_mut()
            .configure(BehaviorKind::Error, Payload::Error(error.into()));
        self
    }

    /// Record calls but let the real implementation answer
    pub fn and_passthrough(&self) -> &Self {
        self.inner
            .borrow_mut()
            .configure(BehaviorKind::Passthrough, Payload::None);
        self
    }

    // ------------------------------------------------------------------
    // Expectations
    // ------------------------------------------------------------------

    pub fn times(&self, count: usize) -> &Self {
        self.inner.borrow_mut().expectation = Expectation::exactly(count);
        self
    }

    pub fn once(&self) -> &Self {
        self.times(1)
    }

    pub fn twice(&self) -> &Self {
        self.times(2)
    }

    pub fn never(&self) -> &Self {
        self.times(0)
    }

    pub fn at_least(&self, count: usize) -> &Self {
        let mut behavior = self.inner.borrow_mut();
        behavior.expectation = behavior.expectation.with_min(count);
        drop(behavior);
        self
    }

    pub fn at_most(&self, count: usize) -> &Self {
        let mut behavior = self.inner.borrow_mut();
        behavior.expectation = behavior.expectation.with_max(count);
        drop(behavior);
        self
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Route calls to the real implementation without losing history
    pub fn disable(&self) -> &Self {
        self.inner.borrow_mut().enabled = false;
        self
    }

    pub fn enable(&self) -> &Self {
        self.inner.borrow_mut().enabled = true;
        self
    }

    /// Forget recorded calls but keep the configured behavior
    pub fn reset(&self) -> &Self {
        let mut behavior = self.inner.borrow_mut();
        behavior.call_count = 0;
        behavior.history.clear();
        drop(behavior);
        self
    }

    /// Remove this mock from its registry; the symbol calls through again.
    ///
    /// A handle left over from before a clear never removes a newer mock
    /// registered for the same symbol.
    pub fn restore(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut state = registry.borrow_mut();
        if state
            .registered(&self.key)
            .is_some_and(|current| current.is_same_mock(self))
        {
            state.remove(&self.key);
            trace!(key = ?self.key, "Mock restored");
        } else {
            debug!(key = ?self.key, "Stale mock handle; nothing to restore");
        }
    }

    pub fn verify(&self) -> Result<(), MockExpectationError> {
        self.inner.borrow().verify()
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn symbol(&self) -> String {
        self.inner.borrow().symbol.clone()
    }

    pub fn kind(&self) -> BehaviorKind {
        self.inner.borrow().kind
    }

    pub fn expectation(&self) -> Expectation {
        self.inner.borrow().expectation
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    pub fn call_count(&self) -> usize {
        self.inner.borrow().call_count
    }

    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    pub fn was_called_with(&self, arguments: &[Value]) -> bool {
        self.inner
            .borrow()
            .history
            .iter()
            .any(|record| record.arguments == arguments)
    }

    pub fn calls(&self) -> Vec<InvocationRecord> {
        self.inner.borrow().history.clone()
    }

    pub fn last_call(&self) -> Option<InvocationRecord> {
        self.inner.borrow().history.last().cloned()
    }

    pub(crate) fn key(&self) -> &MockKey {
        &self.key
    }

    pub(crate) fn is_same_mock(&self, other: &MockHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Interception
    // ------------------------------------------------------------------

    /// Run one intercepted invocation.
    ///
    /// Disabled mocks call `real` without counting or recording. Enabled
    /// mocks count the call, resolve it through the configured behavior
    /// (calling `real` for pass-through), and append an invocation record.
    pub(crate) fn dispatch<F>(&self, arguments: &[Value], real: F) -> anyhow::Result<Value>
    where
        F: FnOnce(&[Value]) -> anyhow::Result<Value>,
    {
        let step = {
            let mut behavior = self.inner.borrow_mut();
            if !behavior.enabled {
                drop(behavior);
                return real(arguments);
            }
            behavior.call_count += 1;
            behavior.next_step()
        };

        let result = match step {
            Step::Return(value) => Ok(value),
            Step::Compute(callable) => Ok(callable(arguments)),
            Step::Throw(error) => Err(anyhow::Error::new(error)),
            Step::Passthrough => real(arguments),
        };

        self.record(arguments, &result);
        result
    }

    fn record(&self, arguments: &[Value], result: &anyhow::Result<Value>) {
        let occurred_at = self.sequence.next();
        let mut behavior = self.inner.borrow_mut();
        let recorded = match result {
            Ok(value) => Ok(value.clone()),
            Err(error) => Err(format!("{error:#}")),
        };
        if let Err(error) = &recorded {
            warn!(symbol = %behavior.symbol, %error, "Intercepted call failed");
        }
        trace!(
            symbol = %behavior.symbol,
            occurred_at,
            call_count = behavior.call_count,
            "Intercepted call"
        );
        behavior.history.push(InvocationRecord {
            arguments: arguments.to_vec(),
            result: recorded,
            occurred_at,
        });
    }
}

#[cfg(test)]
mod tests {
    include!("behavior.test.rs");
}
