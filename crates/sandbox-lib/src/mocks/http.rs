use super::UnmockedRequestError;
use super::behavior::{BehaviorKind, MockHandle};
use super::registry::MockRegistry;
use anyhow::Context;
use serde_json::Value;
use tracing::{debug, warn};

pub use crate::host::{HttpRequest, HttpResponse, HttpTransport};

/// How the interceptor answered a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDisposition {
    /// A rule fabricated the response
    Mocked,
    /// The live transport answered (no rule, a disabled rule, or pass-through)
    PassedThrough,
    /// No rule matched while unmatched requests were blocked
    Blocked,
}

/// One entry of the request history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub request: HttpRequest,
    pub occurred_at: u64,
    /// Pattern of the rule that handled the request
    pub matched_rule: Option<String>,
    pub disposition: RequestDisposition,
    /// Response status, absent when the request failed
    pub status: Option<u16>,
}

impl MockHandle {
    /// Answer every matching request with `response`
    pub fn and_respond(&self, response: HttpResponse) -> &Self {
        self.and_return(response_to_value(&response))
    }

    /// Build each response from the intercepted request
    pub fn and_respond_with<F>(&self, respond: F) -> &Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + 'static,
    {
        self.and_return_using(move |args| {
            let request = args
                .first()
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_default();
            response_to_value(&respond(&request))
        })
    }

    /// Answer with each response in turn, repeating the last one
    pub fn and_respond_sequence<I>(&self, responses: I) -> &Self
    where
        I: IntoIterator<Item = HttpResponse>,
    {
        self.and_return_consecutive(responses.into_iter().map(|r| response_to_value(&r)))
    }
}

fn response_to_value(response: &HttpResponse) -> Value {
    serde_json::to_value(response).unwrap_or_default()
}

/// Interpret a mock's return value as a response.
///
/// Objects deserialize field by field, strings become a 200 body, null is an
/// empty 200 and any other value is serialized into the body.
fn response_from_value(value: Value) -> anyhow::Result<HttpResponse> {
    match value {
        Value::Null => Ok(HttpResponse::default()),
        Value::String(body) => Ok(HttpResponse::ok(body)),
        Value::Object(_) => {
            serde_json::from_value(value).context("Mocked HTTP response has an invalid shape")
        }
        other => Ok(HttpResponse::ok(other.to_string())),
    }
}

/// Transport that answers from URL-pattern rules before the network
pub struct HttpInterceptor {
    registry: MockRegistry,
    live: Box<dyn HttpTransport>,
}

impl HttpInterceptor {
    pub fn new(registry: MockRegistry, live: Box<dyn HttpTransport>) -> Self {
        Self { registry, live }
    }

    pub fn live(&self) -> &dyn HttpTransport {
        self.live.as_ref()
    }

    fn send_mocked(
        &self,
        request: &HttpRequest,
        pattern: String,
        handle: MockHandle,
    ) -> anyhow::Result<HttpResponse> {
        let passthrough = handle.kind() == BehaviorKind::Passthrough;
        let arguments = [serde_json::to_value(request)?];
        let result = handle
            .dispatch(&arguments, |_| {
                let response = self.live.send(request)?;
                Ok(response_to_value(&response))
            })
            .and_then(response_from_value);

        debug!(
            method = %request.method,
            url = %request.url,
            rule = %pattern,
            passthrough,
            "Intercepted HTTP request"
        );
        self.registry.record_request(RecordedRequest {
            request: request.clone(),
            occurred_at: self.registry.sequence().current(),
            matched_rule: Some(pattern),
            disposition: if passthrough {
                RequestDisposition::PassedThrough
            } else {
                RequestDisposition::Mocked
            },
            status: result.as_ref().ok().map(|r| r.status),
        });
        result
    }

    fn send_unmatched(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let occurred_at = self.registry.sequence().next();

        if self.registry.is_blocking_unmatched() {
            warn!(method = %request.method, url = %request.url, "Blocked unmocked HTTP request");
            self.registry.record_request(RecordedRequest {
                request: request.clone(),
                occurred_at,
                matched_rule: None,
                disposition: RequestDisposition::Blocked,
                status: None,
            });
            return Err(UnmockedRequestError {
                method: request.method.clone(),
                url: request.url.clone(),
            }
            .into());
        }

        let result = self.live.send(request);
        self.registry.record_request(RecordedRequest {
            request: request.clone(),
            occurred_at,
            matched_rule: None,
            disposition: RequestDisposition::PassedThrough,
            status: result.as_ref().ok().map(|r| r.status),
        });
        result
    }
}

impl HttpTransport for HttpInterceptor {
    fn send(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        match self.registry.match_http(&request.method, &request.url) {
            Some((pattern, handle)) if handle.is_enabled() => {
                self.send_mocked(request, pattern, handle)
            }
            _ => self.send_unmatched(request),
        }
    }
}

#[cfg(test)]
mod tests {
    include!("http.test.rs");
}
