use super::{
    Clock, EventBus, FunctionDispatch, HookCallback, HostServices, HttpRequest, HttpResponse,
    HttpTransport,
};
use crate::config::SandboxConfig;
use crate::mocks::UndefinedFunctionError;
use crate::storage::TransactionalConnection;
use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

pub type NativeFn = Rc<dyn Fn(&[Value]) -> anyhow::Result<Value>>;

/// Live implementation of FunctionDispatch
#[derive(Default)]
pub struct FunctionTable {
    functions: RefCell<BTreeMap<String, NativeFn>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the implementation of `name`
    pub fn register<F>(&self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + 'static,
    {
        self.functions
            .borrow_mut()
            .insert(name.to_string(), Rc::new(func));
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F>(self, name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + 'static,
    {
        self.register(name, func);
        self
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.functions.borrow_mut().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.functions.borrow().keys().cloned().collect()
    }
}

impl FunctionDispatch for FunctionTable {
    fn call(&self, name: &str, args: &[Value]) -> anyhow::Result<Value> {
        // Clone out so the function may register or call others
        let func = self.functions.borrow().get(name).cloned();
        match func {
            Some(func) => func(args),
            None => Err(UndefinedFunctionError {
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.functions.borrow().contains_key(name)
    }
}

#[derive(Debug, Clone)]
struct Attached {
    priority: i32,
    order: u64,
    callback: HookCallback,
}

/// Live implementation of EventBus
#[derive(Debug, Default)]
pub struct LiveEventBus {
    hooks: RefCell<BTreeMap<String, Vec<Attached>>>,
    order: Cell<u64>,
}

impl LiveEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks in dispatch order, detached from the bus borrow
    fn snapshot(&self, hook: &str) -> Vec<HookCallback> {
        self.hooks
            .borrow()
            .get(hook)
            .map(|attached| attached.iter().map(|a| a.callback.clone()).collect())
            .unwrap_or_default()
    }

    pub fn callback_count(&self, hook: &str) -> usize {
        self.hooks.borrow().get(hook).map_or(0, Vec::len)
    }
}

impl EventBus for LiveEventBus {
    fn add_filter(&self, hook: &str, callback: HookCallback, priority: i32) {
        let order = self.order.get() + 1;
        self.order.set(order);
        trace!(hook, callback = callback.name(), priority, "add_filter");

        let mut hooks = self.hooks.borrow_mut();
        let attached = hooks.entry(hook.to_string()).or_default();
        attached.push(Attached {
            priority,
            order,
            callback,
        });
        attached.sort_by_key(|a| (a.priority, a.order));
    }

    fn remove_filter(&self, hook: &str, callback: &str, priority: i32) -> bool {
        let mut hooks = self.hooks.borrow_mut();
        let Some(attached) = hooks.get_mut(hook) else {
            return false;
        };
        match attached
            .iter()
            .position(|a| a.priority == priority && a.callback.name() == callback)
        {
            Some(index) => {
                attached.remove(index);
                true
            }
            None => false,
        }
    }

    fn has_filter(&self, hook: &str, callback: &str) -> Option<i32> {
        self.hooks
            .borrow()
            .get(hook)?
            .iter()
            .find(|a| a.callback.name() == callback)
            .map(|a| a.priority)
    }

    fn apply_filters(&self, hook: &str, value: Value, args: &[Value]) -> anyhow::Result<Value> {
        let mut current = value;
        for callback in self.snapshot(hook) {
            let mut arguments = Vec::with_capacity(args.len() + 1);
            arguments.push(current);
            arguments.extend_from_slice(args);
            current = callback
                .call(&arguments)
                .with_context(|| format!("Filter '{}' on '{hook}' failed", callback.name()))?;
        }
        Ok(current)
    }

    fn do_action(&self, hook: &str, args: &[Value]) -> anyhow::Result<()> {
        for callback in self.snapshot(hook) {
            callback
                .call(args)
                .with_context(|| format!("Action '{}' on '{hook}' failed", callback.name()))?;
        }
        Ok(())
    }
}

/// Live implementation of HttpTransport
pub struct LiveHttpTransport {
    client: Client,
}

impl LiveHttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub fn from_config(config: &SandboxConfig) -> anyhow::Result<Self> {
        Self::new(config.http_timeout())
    }
}

impl HttpTransport for LiveHttpTransport {
    fn send(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("Invalid HTTP method '{}'", request.method))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .with_context(|| format!("{} {} failed", request.method, request.url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .with_context(|| format!("Failed to read body of {}", request.url))?;

        debug!(method = %request.method, url = %request.url, status, "Live HTTP request");
        Ok(HttpResponse {
            status,
            body,
            headers,
        })
    }
}

/// Live implementation of Clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Production wiring of every host service
pub struct LiveHost<C: TransactionalConnection> {
    storage: C,
    functions: FunctionTable,
    hooks: LiveEventBus,
    http: LiveHttpTransport,
    clock: SystemClock,
}

impl<C: TransactionalConnection> LiveHost<C> {
    pub fn new(
        storage: C,
        functions: FunctionTable,
        config: &SandboxConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            storage,
            functions,
            hooks: LiveEventBus::new(),
            http: LiveHttpTransport::from_config(config)?,
            clock: SystemClock,
        })
    }

    pub fn function_table(&self) -> &FunctionTable {
        &self.functions
    }
}

impl<C: TransactionalConnection> HostServices for LiveHost<C> {
    type Storage = C;

    fn storage(&self) -> &C {
        &self.storage
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

#[cfg(test)]
mod tests {
    include!("live.test.rs");
}
