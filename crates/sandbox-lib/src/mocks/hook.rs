use super::registry::MockRegistry;
use super::record::Sequence;
use crate::host::{EventBus, HookCallback};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// One `add_filter`/`add_action` call seen by a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRegistration {
    pub callback: String,
    pub priority: i32,
    pub accepted_args: usize,
    pub occurred_at: u64,
    /// Set once a matching `remove_filter` was seen
    pub removed: bool,
}

/// Records the wiring of one hook for later assertions
#[derive(Debug, Clone)]
pub struct HookCapture {
    hook: String,
    registrations: Rc<RefCell<Vec<HookRegistration>>>,
    sequence: Sequence,
}

impl HookCapture {
    pub(crate) fn new(hook: &str, sequence: Sequence) -> Self {
        Self {
            hook: hook.to_string(),
            registrations: Rc::new(RefCell::new(Vec::new())),
            sequence,
        }
    }

    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// Every registration, including removed ones, in registration order
    pub fn registrations(&self) -> Vec<HookRegistration> {
        self.registrations.borrow().clone()
    }

    /// Registrations still in place
    pub fn active(&self) -> Vec<HookRegistration> {
        self.registrations
            .borrow()
            .iter()
            .filter(|r| !r.removed)
            .cloned()
            .collect()
    }

    pub fn has_callback(&self, callback: &str) -> bool {
        self.priority_of(callback).is_some()
    }

    /// Priority of the most recent active registration of `callback`
    pub fn priority_of(&self, callback: &str) -> Option<i32> {
        self.registrations
            .borrow()
            .iter()
            .rev()
            .find(|r| !r.removed && r.callback == callback)
            .map(|r| r.priority)
    }

    pub fn count(&self) -> usize {
        self.registrations.borrow().iter().filter(|r| !r.removed).count()
    }

    pub(crate) fn record_add(&self, callback: &HookCallback, priority: i32) {
        let occurred_at = self.sequence.next();
        trace!(
            hook = %self.hook,
            callback = callback.name(),
            priority,
            "Captured hook registration"
        );
        self.registrations.borrow_mut().push(HookRegistration {
            callback: callback.name().to_string(),
            priority,
            accepted_args: callback.accepted_args(),
            occurred_at,
            removed: false,
        });
    }

    pub(crate) fn record_remove(&self, callback: &str, priority: i32) {
        let mut registrations = self.registrations.borrow_mut();
        if let Some(registration) = registrations
            .iter_mut()
            .rev()
            .find(|r| !r.removed && r.callback == callback && r.priority == priority)
        {
            registration.removed = true;
        }
    }
}

/// Event bus that consults the registry before the live bus
///
/// Captures observe registrations and forward them unchanged. Overrides
/// replace dispatch: the filtered value (followed by the extra arguments) is
/// the invocation's argument list, and pass-through hands it to the live bus.
pub struct HookInterceptor {
    registry: MockRegistry,
    live: Box<dyn EventBus>,
}

impl HookInterceptor {
    pub fn new(registry: MockRegistry, live: Box<dyn EventBus>) -> Self {
        Self { registry, live }
    }

    pub fn live(&self) -> &dyn EventBus {
        self.live.as_ref()
    }
}

impl EventBus for HookInterceptor {
    fn add_filter(&self, hook: &str, callback: HookCallback, priority: i32) {
        if let Some(capture) = self.registry.capture(hook) {
            capture.record_add(&callback, priority);
        }
        self.live.add_filter(hook, callback, priority);
    }

    fn remove_filter(&self, hook: &str, callback: &str, priority: i32) -> bool {
        if let Some(capture) = self.registry.capture(hook) {
            capture.record_remove(callback, priority);
        }
        self.live.remove_filter(hook, callback, priority)
    }

    fn has_filter(&self, hook: &str, callback: &str) -> Option<i32> {
        self.live.has_filter(hook, callback)
    }

    fn apply_filters(&self, hook: &str, value: Value, args: &[Value]) -> anyhow::Result<Value> {
        let Some(handle) = self.registry.hook(hook) else {
            return self.live.apply_filters(hook, value, args);
        };

        let mut arguments = Vec::with_capacity(args.len() + 1);
        arguments.push(value);
        arguments.extend_from_slice(args);

        handle.dispatch(&arguments, |arguments| {
            let (value, rest) = arguments
                .split_first()
                .map_or((Value::Null, &[][..]), |(v, rest)| (v.clone(), rest));
            self.live.apply_filters(hook, value, rest)
        })
    }

    fn do_action(&self, hook: &str, args: &[Value]) -> anyhow::Result<()> {
        match self.registry.hook(hook) {
            Some(handle) => handle
                .dispatch(args, |args| self.live.do_action(hook, args).map(|()| Value::Null))
                .map(|_| ()),
            None => self.live.do_action(hook, args),
        }
    }
}

#[cfg(test)]
mod tests {
    include!("hook.test.rs");
}
