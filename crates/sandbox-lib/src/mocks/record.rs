use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;

/// Monotonic logical clock shared by every mock of one registry.
///
/// Invocation order stays deterministic even while the wall clock is mocked.
#[derive(Debug, Clone, Default)]
pub struct Sequence(Rc<Cell<u64>>);

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number (the first is 1)
    pub fn next(&self) -> u64 {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }

    /// Last number handed out, 0 before any invocation
    pub fn current(&self) -> u64 {
        self.0.get()
    }
}

/// A single captured invocation
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub arguments: Vec<Value>,
    /// Returned value, or the rendered error
    pub result: Result<Value, String>,
    pub occurred_at: u64,
}

impl InvocationRecord {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }
}
