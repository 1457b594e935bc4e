use super::behavior::{MockBehavior, MockHandle};
use super::clock::{CLOCK_SYMBOL, ClockState};
use super::hook::HookCapture;
use super::http::{HttpResponse, RecordedRequest};
use super::pattern::{UrlPattern, normalize_url};
use super::record::Sequence;
use super::{PatternError, VerificationError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Identity of one registered mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockKey {
    Function(String),
    Hook(String),
    Http {
        method: Option<String>,
        pattern: String,
    },
    Clock,
}

#[derive(Debug)]
pub(crate) struct HttpRule {
    pub(crate) method: Option<String>,
    pub(crate) pattern: UrlPattern,
    pub(crate) handle: MockHandle,
}

impl HttpRule {
    fn accepts(&self, method: &str, url: &str) -> bool {
        self.method
            .as_deref()
            .is_none_or(|m| m.eq_ignore_ascii_case(method))
            && self.pattern.matches(url)
    }
}

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) functions: BTreeMap<String, MockHandle>,
    pub(crate) hooks: BTreeMap<String, MockHandle>,
    pub(crate) captures: BTreeMap<String, HookCapture>,
    /// Registration order is match order
    pub(crate) http_rules: Vec<HttpRule>,
    pub(crate) requests: Vec<RecordedRequest>,
    pub(crate) clock: Option<ClockState>,
    pub(crate) block_unmatched: bool,
    pub(crate) default_block_unmatched: bool,
}

impl RegistryState {
    pub(crate) fn remove(&mut self, key: &MockKey) -> bool {
        match key {
            MockKey::Function(name) => self.functions.remove(name).is_some(),
            MockKey::Hook(name) => self.hooks.remove(name).is_some(),
            MockKey::Http { method, pattern } => {
                let before = self.http_rules.len();
                self.http_rules
                    .retain(|rule| !(rule.method == *method && rule.pattern.as_str() == pattern));
                before != self.http_rules.len()
            }
            MockKey::Clock => self.clock.take().is_some(),
        }
    }

    /// Handle currently registered under `key`
    pub(crate) fn registered(&self, key: &MockKey) -> Option<&MockHandle> {
        match key {
            MockKey::Function(name) => self.functions.get(name),
            MockKey::Hook(name) => self.hooks.get(name),
            MockKey::Http { method, pattern } => self
                .http_rules
                .iter()
                .find(|rule| rule.method == *method && rule.pattern.as_str() == pattern)
                .map(|rule| &rule.handle),
            MockKey::Clock => self.clock.as_ref().map(|clock| &clock.handle),
        }
    }

    fn handles(&self) -> Vec<MockHandle> {
        self.functions
            .values()
            .chain(self.hooks.values())
            .chain(self.http_rules.iter().map(|rule| &rule.handle))
            .chain(self.clock.as_ref().map(|clock| &clock.handle))
            .cloned()
            .collect()
    }
}

/// Collection of every active mock, one per symbol
///
/// Cloning yields another handle on the same registry. A registry belongs to
/// one sandbox; independent sandboxes never share mocks.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    state: Rc<RefCell<RegistryState>>,
    sequence: Sequence,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose HTTP switch starts (and resets to) blocking
    pub fn with_block_unmatched(block: bool) -> Self {
        let registry = Self::default();
        {
            let mut state = registry.state.borrow_mut();
            state.block_unmatched = block;
            state.default_block_unmatched = block;
        }
        registry
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    fn handle(&self, symbol: &str, key: MockKey) -> MockHandle {
        MockHandle::new(
            MockBehavior::new(symbol),
            key,
            Rc::downgrade(&self.state),
            self.sequence.clone(),
        )
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Mock a named function. Registering an already-mocked name returns the
    /// existing handle so configuration can be chained across calls.
    pub fn mock_function(&self, name: &str) -> MockHandle {
        if let Some(existing) = self.function(name) {
            return existing;
        }
        let handle = self.handle(name, MockKey::Function(name.to_string()));
        self.state
            .borrow_mut()
            .functions
            .insert(name.to_string(), handle.clone());
        debug!(function = name, "Registered function mock");
        handle
    }

    pub fn function(&self, name: &str) -> Option<MockHandle> {
        self.state.borrow().functions.get(name).cloned()
    }

    /// Override a hook's dispatch. Starts in pass-through so the override
    /// only counts calls until a return behavior is configured.
    pub fn mock_hook(&self, hook: &str) -> MockHandle {
        if let Some(existing) = self.hook(hook) {
            return existing;
        }
        let handle = self.handle(hook, MockKey::Hook(hook.to_string()));
        handle.and_passthrough();
        self.state
            .borrow_mut()
            .hooks
            .insert(hook.to_string(), handle.clone());
        debug!(hook, "Registered hook override");
        handle
    }

    pub fn hook(&self, hook: &str) -> Option<MockHandle> {
        self.state.borrow().hooks.get(hook).cloned()
    }

    /// Record callback registrations on `hook` without changing dispatch
    pub fn capture_hook(&self, hook: &str) -> HookCapture {
        let mut state = self.state.borrow_mut();
        state
            .captures
            .entry(hook.to_string())
            .or_insert_with(|| {
                debug!(hook, "Capturing hook registrations");
                HookCapture::new(hook, self.sequence.clone())
            })
            .clone()
    }

    pub fn capture(&self, hook: &str) -> Option<HookCapture> {
        self.state.borrow().captures.get(hook).cloned()
    }

    /// Mock every request whose URL matches `pattern`, whatever its method
    pub fn mock_http(&self, pattern: &str) -> Result<MockHandle, PatternError> {
        self.register_http(None, pattern)
    }

    /// Mock requests with the given method whose URL matches `pattern`
    pub fn mock_http_method(
        &self,
        method: &str,
        pattern: &str,
    ) -> Result<MockHandle, PatternError> {
        self.register_http(Some(method.to_ascii_uppercase()), pattern)
    }

    fn register_http(
        &self,
        method: Option<String>,
        pattern: &str,
    ) -> Result<MockHandle, PatternError> {
        let pattern = UrlPattern::compile(pattern)?;

        let mut state = self.state.borrow_mut();
        if let Some(rule) = state
            .http_rules
            .iter()
            .find(|rule| rule.method == method && rule.pattern == pattern)
        {
            return Ok(rule.handle.clone());
        }

        let handle = self.handle(
            pattern.as_str(),
            MockKey::Http {
                method: method.clone(),
                pattern: pattern.as_str().to_string(),
            },
        );
        handle.and_return(serde_json::to_value(HttpResponse::default()).unwrap_or_default());
        debug!(
            pattern = %pattern,
            method = ?method,
            position = state.http_rules.len(),
            "Registered HTTP mock"
        );
        state.http_rules.push(HttpRule {
            method,
            pattern,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// First rule, in registration order, accepting this request
    pub(crate) fn match_http(&self, method: &str, url: &str) -> Option<(String, MockHandle)> {
        self.state
            .borrow()
            .http_rules
            .iter()
            .find(|rule| rule.accepts(method, url))
            .map(|rule| (rule.pattern.as_str().to_string(), rule.handle.clone()))
    }

    /// The clock handle, registering it on first use
    pub(crate) fn clock_handle(&self) -> MockHandle {
        if let Some(clock) = &self.state.borrow().clock {
            return clock.handle.clone();
        }
        let handle = self.handle(CLOCK_SYMBOL, MockKey::Clock);
        handle.and_passthrough();
        self.state.borrow_mut().clock = Some(ClockState::new(handle.clone()));
        handle
    }

    /// Read or change the clock state. `f` must not call back into the registry.
    pub(crate) fn with_clock<R>(&self, f: impl FnOnce(&mut ClockState) -> R) -> R {
        let handle = self.clock_handle();
        let mut state = self.state.borrow_mut();
        let clock = state.clock.get_or_insert_with(|| ClockState::new(handle));
        f(clock)
    }

    pub(crate) fn clock_state(&self) -> Option<ClockState> {
        self.state.borrow().clock.clone()
    }

    // ------------------------------------------------------------------
    // Unmatched HTTP switch and request history
    // ------------------------------------------------------------------

    /// Raise `UnmockedRequestError` for requests no rule matches
    pub fn block_unmatched(&self) {
        self.state.borrow_mut().block_unmatched = true;
    }

    /// Let requests no rule matches reach the network
    pub fn allow_unmatched(&self) {
        self.state.borrow_mut().block_unmatched = false;
    }

    pub fn is_blocking_unmatched(&self) -> bool {
        self.state.borrow().block_unmatched
    }

    pub(crate) fn record_request(&self, request: RecordedRequest) {
        self.state.borrow_mut().requests.push(request);
    }

    /// Every request seen since the last clear, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.borrow().requests.clone()
    }

    /// Requests whose URL matches `pattern`.
    ///
    /// A pattern without `?` accepts any query string and trailing slashes are
    /// ignored; use [`requests_exact`](Self::requests_exact) to pin one URL.
    pub fn requests_to(&self, pattern: &str) -> Result<Vec<RecordedRequest>, PatternError> {
        let pattern = UrlPattern::compile(pattern)?;
        Ok(self
            .state
            .borrow()
            .requests
            .iter()
            .filter(|recorded| pattern.matches(&recorded.request.url))
            .cloned()
            .collect())
    }

    pub fn request_count(&self, pattern: &str) -> Result<usize, PatternError> {
        Ok(self.requests_to(pattern)?.len())
    }

    /// Requests made to exactly `url`, query string and trailing slash included.
    /// Scheme and host case and default ports are normalized on both sides.
    pub fn requests_exact(&self, url: &str) -> Vec<RecordedRequest> {
        let Some(expected) = normalize_url(url) else {
            return Vec::new();
        };
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|recorded| {
                normalize_url(&recorded.request.url).as_deref() == Some(expected.as_str())
            })
            .cloned()
            .collect()
    }

    pub fn request_count_exact(&self, url: &str) -> usize {
        self.requests_exact(url).len()
    }

    // ------------------------------------------------------------------
    // Verification and cleanup
    // ------------------------------------------------------------------

    /// Every active mock handle
    pub fn handles(&self) -> Vec<MockHandle> {
        self.state.borrow().handles()
    }

    pub fn len(&self) -> usize {
        let state = self.state.borrow();
        state.functions.len()
            + state.hooks.len()
            + state.http_rules.len()
            + usize::from(state.clock.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.state.borrow().captures.is_empty()
    }

    /// Check every expectation, reporting all failures together
    pub fn verify_all(&self) -> Result<(), VerificationError> {
        let failures: Vec<_> = self
            .handles()
            .iter()
            .filter_map(|handle| handle.verify().err())
            .collect();

        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            warn!(
                symbol = %failure.symbol,
                expected = %failure.expected,
                actual = failure.actual,
                "Mock expectation failed"
            );
        }
        Err(VerificationError { failures })
    }

    /// Remove every mock, capture and recorded request. Every symbol calls
    /// through to its real implementation afterwards.
    pub fn clear_all(&self) {
        let mut state = self.state.borrow_mut();
        let cleared = state.functions.len()
            + state.hooks.len()
            + state.captures.len()
            + state.http_rules.len()
            + usize::from(state.clock.is_some());
        state.functions.clear();
        state.hooks.clear();
        state.captures.clear();
        state.http_rules.clear();
        state.requests.clear();
        state.clock = None;
        state.block_unmatched = state.default_block_unmatched;
        debug!(cleared, "Cleared mock registry");
    }

    pub fn clear_function(&self, name: &str) -> bool {
        self.state
            .borrow_mut()
            .remove(&MockKey::Function(name.to_string()))
    }

    /// Remove both the override and the capture of `hook`
    pub fn clear_hook(&self, hook: &str) -> bool {
        let mut state = self.state.borrow_mut();
        let captured = state.captures.remove(hook).is_some();
        state.remove(&MockKey::Hook(hook.to_string())) || captured
    }

    /// Remove every rule registered with this exact pattern text
    pub fn clear_http(&self, pattern: &str) -> Result<bool, PatternError> {
        let pattern = UrlPattern::compile(pattern)?;
        let mut state = self.state.borrow_mut();
        let before = state.http_rules.len();
        state.http_rules.retain(|rule| rule.pattern != pattern);
        Ok(before != state.http_rules.len())
    }

    pub fn clear_clock(&self) -> bool {
        self.state.borrow_mut().remove(&MockKey::Clock)
    }
}

#[cfg(test)]
mod tests {
    include!("registry.test.rs");
}
