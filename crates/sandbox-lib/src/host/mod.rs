//! Host service seam
//!
//! Application code under test reaches every non-deterministic capability
//! (storage, named functions, hooks, outbound HTTP, the clock) through
//! [`HostServices`]. Production wires [`LiveHost`]; tests wire a
//! [`Sandbox`](crate::Sandbox), which wraps the same live services in
//! interceptors.

use crate::storage::TransactionalConnection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub mod live;

pub use live::{FunctionTable, LiveEventBus, LiveHost, LiveHttpTransport, SystemClock};

/// Provider trait for calling named host functions
pub trait FunctionDispatch {
    /// Call `name` with positional arguments
    fn call(&self, name: &str, args: &[Value]) -> anyhow::Result<Value>;

    /// Whether a real implementation is registered under `name`
    fn exists(&self, name: &str) -> bool;
}

pub type HookFn = Rc<dyn Fn(&[Value]) -> anyhow::Result<Value>>;

/// Named callback attached to a hook
#[derive(Clone)]
pub struct HookCallback {
    name: String,
    accepted_args: usize,
    func: HookFn,
}

impl HookCallback {
    /// Callback receiving only the first argument (the filtered value)
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + 'static,
    {
        Self {
            name: name.into(),
            accepted_args: 1,
            func: Rc::new(func),
        }
    }

    pub fn accepting(mut self, accepted_args: usize) -> Self {
        self.accepted_args = accepted_args;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepted_args(&self) -> usize {
        self.accepted_args
    }

    /// Invoke with at most `accepted_args` leading arguments
    pub fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        let take = self.accepted_args.min(args.len());
        (self.func)(&args[..take])
    }
}

impl fmt::Debug for HookCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookCallback")
            .field("name", &self.name)
            .field("accepted_args", &self.accepted_args)
            .finish_non_exhaustive()
    }
}

/// Provider trait for filter and action hooks
///
/// Lower priorities run first; equal priorities run in registration order.
pub trait EventBus {
    fn add_filter(&self, hook: &str, callback: HookCallback, priority: i32);

    /// Detach `callback` registered at `priority`, returning whether it was attached
    fn remove_filter(&self, hook: &str, callback: &str, priority: i32) -> bool;

    /// Priority of `callback` on `hook`, if attached
    fn has_filter(&self, hook: &str, callback: &str) -> Option<i32>;

    /// Thread `value` through every callback; each return becomes the next input
    fn apply_filters(&self, hook: &str, value: Value, args: &[Value]) -> anyhow::Result<Value>;

    /// Run every callback for its side effects
    fn do_action(&self, hook: &str, args: &[Value]) -> anyhow::Result<()>;

    fn add_action(&self, hook: &str, callback: HookCallback, priority: i32) {
        self.add_filter(hook, callback, priority);
    }
}

/// Outbound HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url: String::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

impl HttpRequest {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new("POST", url).with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Structured HTTP response, real or fabricated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Keyed by lowercase header name
    #[serde(deserialize_with = "deserialize_header_map")]
    pub headers: BTreeMap<String, String>,
}

fn deserialize_header_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect())
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            headers: BTreeMap::new(),
        }
    }
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// 200 response with a JSON body and content type
    pub fn json(body: &Value) -> Self {
        Self::ok(body.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json_body(&self) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Provider trait for outbound HTTP
pub trait HttpTransport {
    fn send(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse>;
}

/// Provider trait for reading the current time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Seconds since the Unix epoch
    fn timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Everything host application code may touch
pub trait HostServices {
    type Storage: TransactionalConnection;

    fn storage(&self) -> &Self::Storage;

    fn functions(&self) -> &dyn FunctionDispatch;

    fn hooks(&self) -> &dyn EventBus;

    fn http(&self) -> &dyn HttpTransport;

    fn clock(&self) -> &dyn Clock;
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
