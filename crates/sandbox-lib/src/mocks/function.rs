use super::registry::MockRegistry;
use crate::host::FunctionDispatch;
use serde_json::Value;

/// Function dispatcher that consults the registry by exact name
///
/// A mocked name answers from its behavior; pass-through and disabled mocks
/// reach the live table, which reports unknown names as undefined.
pub struct FunctionInterceptor {
    registry: MockRegistry,
    live: Box<dyn FunctionDispatch>,
}

impl FunctionInterceptor {
    pub fn new(registry: MockRegistry, live: Box<dyn FunctionDispatch>) -> Self {
        Self { registry, live }
    }

    pub fn live(&self) -> &dyn FunctionDispatch {
        self.live.as_ref()
    }
}

impl FunctionDispatch for FunctionInterceptor {
    fn call(&self, name: &str, args: &[Value]) -> anyhow::Result<Value> {
        match self.registry.function(name) {
            Some(handle) => handle.dispatch(args, |args| self.live.call(name, args)),
            None => self.live.call(name, args),
        }
    }

    /// Mocked names exist even without a real implementation
    fn exists(&self, name: &str) -> bool {
        self.registry.function(name).is_some() || self.live.exists(name)
    }
}

#[cfg(test)]
mod tests {
    include!("function.test.rs");
}
