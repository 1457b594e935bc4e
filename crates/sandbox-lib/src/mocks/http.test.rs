use super::*;
use crate::host::LiveHttpTransport;
use crate::mocks::{PatternError, ThrownError};
use mockito::Server;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Live stand-in answering "live" and counting requests
struct CountingTransport {
    sent: Rc<Cell<usize>>,
}

impl HttpTransport for CountingTransport {
    fn send(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        self.sent.set(self.sent.get() + 1);
        Ok(HttpResponse::ok("live"))
    }
}

fn interceptor() -> (MockRegistry, HttpInterceptor, Rc<Cell<usize>>) {
    let registry = MockRegistry::new();
    let sent = Rc::new(Cell::new(0));
    let http = HttpInterceptor::new(
        registry.clone(),
        Box::new(CountingTransport {
            sent: Rc::clone(&sent),
        }),
    );
    (registry, http, sent)
}

#[test]
fn test_matching_rule_fabricates_response() {
    let (registry, http, sent) = interceptor();
    registry
        .mock_http("https://api.example.com/users")
        .unwrap()
        .and_respond(HttpResponse::json(&json!([{"id": 1}])));

    let response = http
        .send(&HttpRequest::get("https://api.example.com/users"))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.json_body().unwrap(), json!([{"id": 1}]));
    assert_eq!(sent.get(), 0);
}

#[test]
fn test_default_rule_response_is_empty_200() {
    let (registry, http, _) = interceptor();
    registry.mock_http("https://api.example.com/*").unwrap();

    let response = http.send(&HttpRequest::get("https://api.example.com/ping")).unwrap();
    assert_eq!(response, HttpResponse::default());
}

#[test]
fn test_first_registered_rule_wins() {
    let (registry, http, _) = interceptor();
    registry
        .mock_http("https://api.example.com/*")
        .unwrap()
        .and_respond(HttpResponse::ok("wildcard"));
    let specific = registry.mock_http("https://api.example.com/users").unwrap();
    specific.and_respond(HttpResponse::ok("specific"));

    let response = http
        .send(&HttpRequest::get("https://api.example.com/users"))
        .unwrap();
    assert_eq!(response.body, "wildcard");
    assert!(!specific.was_called());
}

#[test]
fn test_reregistering_keeps_original_position() {
    let (registry, http, _) = interceptor();
    let first = registry.mock_http("https://api.example.com/users").unwrap();
    registry
        .mock_http("https://api.example.com/*")
        .unwrap()
        .and_respond(HttpResponse::ok("wildcard"));
    let again = registry.mock_http("https://api.example.com/users").unwrap();
    again.and_respond(HttpResponse::ok("specific"));

    let response = http
        .send(&HttpRequest::get("https://api.example.com/users"))
        .unwrap();
    assert_eq!(response.body, "specific");
    assert_eq!(first.call_count(), 1);
}

#[test]
fn test_method_constraint() {
    let (registry, http, sent) = interceptor();
    registry
        .mock_http_method("post", "https://api.example.com/posts")
        .unwrap()
        .and_respond(HttpResponse::new(201, "created"));

    let created = http
        .send(&HttpRequest::post("https://api.example.com/posts", "{}"))
        .unwrap();
    assert_eq!(created.status, 201);

    let listed = http.send(&HttpRequest::get("https://api.example.com/posts")).unwrap();
    assert_eq!(listed.body, "live");
    assert_eq!(sent.get(), 1);
}

#[test]
fn test_unmatched_passes_through_by_default() {
    let (registry, http, sent) = interceptor();
    let response = http.send(&HttpRequest::get("https://elsewhere.test/")).unwrap();

    assert_eq!(response.body, "live");
    assert_eq!(sent.get(), 1);
    let history = registry.requests();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].disposition, RequestDisposition::PassedThrough);
    assert_eq!(history[0].matched_rule, None);
    assert_eq!(history[0].status, Some(200));
}

#[test]
fn test_block_unmatched_raises() {
    let (registry, http, sent) = interceptor();
    registry.block_unmatched();

    let err = http
        .send(&HttpRequest::get("https://elsewhere.test/leak"))
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<UnmockedRequestError>(),
        Some(&UnmockedRequestError {
            method: "GET".to_string(),
            url: "https://elsewhere.test/leak".to_string(),
        })
    );
    assert_eq!(sent.get(), 0);
    assert_eq!(registry.requests()[0].disposition, RequestDisposition::Blocked);

    registry.allow_unmatched();
    assert!(http.send(&HttpRequest::get("https://elsewhere.test/leak")).is_ok());
}

#[test]
fn test_disabled_rule_is_treated_as_unmatched() {
    let (registry, http, sent) = interceptor();
    let rule = registry.mock_http("https://api.example.com/*").unwrap();
    rule.and_respond(HttpResponse::ok("mocked")).disable();

    let response = http.send(&HttpRequest::get("https://api.example.com/a")).unwrap();
    assert_eq!(response.body, "live");
    assert_eq!(sent.get(), 1);
    assert_eq!(rule.call_count(), 0);

    registry.block_unmatched();
    assert!(http.send(&HttpRequest::get("https://api.example.com/a")).is_err());
}

#[test]
fn test_respond_with_sees_the_request() {
    let (registry, http, _) = interceptor();
    registry
        .mock_http("https://api.example.com/echo")
        .unwrap()
        .and_respond_with(|request| {
            let body = request.body.clone().unwrap_or_default();
            HttpResponse::ok(format!("{} {body}", request.method))
        });

    let response = http
        .send(&HttpRequest::post("https://api.example.com/echo", "ping"))
        .unwrap();
    assert_eq!(response.body, "POST ping");
}

#[test]
fn test_respond_sequence_then_sticky() {
    let (registry, http, _) = interceptor();
    registry
        .mock_http("https://api.example.com/job")
        .unwrap()
        .and_respond_sequence([HttpResponse::new(202, "pending"), HttpResponse::ok("done")]);

    let statuses: Vec<u16> = (0..3)
        .map(|_| {
            http.send(&HttpRequest::get("https://api.example.com/job"))
                .unwrap()
                .status
        })
        .collect();
    assert_eq!(statuses, vec![202, 200, 200]);
}

#[test]
fn test_plain_return_values_become_responses() {
    let (registry, http, _) = interceptor();
    let rule = registry.mock_http("https://api.example.com/*").unwrap();

    rule.and_return("plain text");
    let response = http.send(&HttpRequest::get("https://api.example.com/a")).unwrap();
    assert_eq!((response.status, response.body.as_str()), (200, "plain text"));

    rule.and_return(json!({"status": 404}));
    let response = http.send(&HttpRequest::get("https://api.example.com/a")).unwrap();
    assert_eq!(response.status, 404);

    rule.and_return(json!({"status": "not a number"}));
    assert!(http.send(&HttpRequest::get("https://api.example.com/a")).is_err());
}

#[test]
fn test_thrown_error_records_failure() {
    let (registry, http, _) = interceptor();
    registry
        .mock_http("https://api.example.com/*")
        .unwrap()
        .and_throw(ThrownError::new("timed out").with_code("timeout"));

    let err = http
        .send(&HttpRequest::get("https://api.example.com/slow"))
        .unwrap_err();
    assert_eq!(err.downcast_ref::<ThrownError>().unwrap().message, "timed out");

    let recorded = &registry.requests()[0];
    assert_eq!(recorded.disposition, RequestDisposition::Mocked);
    assert_eq!(recorded.status, None);
    assert_eq!(recorded.matched_rule.as_deref(), Some("https://api.example.com/*"));
}

#[test]
fn test_history_queries_by_exact_url_and_pattern() {
    let (registry, http, _) = interceptor();
    registry.mock_http("https://api.example.com/*").unwrap();

    for path in ["users", "users/1", "posts"] {
        http.send(&HttpRequest::get(format!("https://api.example.com/{path}")))
            .unwrap();
    }
    http.send(&HttpRequest::get("https://cdn.example.com/logo.png")).unwrap();

    assert_eq!(registry.requests().len(), 4);
    assert_eq!(registry.request_count("https://api.example.com/users").unwrap(), 1);
    assert_eq!(registry.request_count("https://api.example.com/users/*").unwrap(), 1);
    assert_eq!(registry.request_count("https://api.example.com/*").unwrap(), 3);
    assert_eq!(registry.request_count("https://*.example.com/users").unwrap(), 1);
    assert!(matches!(
        registry.requests_to("https://*.example.com/*"),
        Err(PatternError::MultipleWildcards { .. })
    ));
    assert!(registry.requests_to("").is_err());

    let history = registry.requests();
    assert!(history.windows(2).all(|w| w[0].occurred_at < w[1].occurred_at));
}

#[test]
fn test_exact_history_lookup_distinguishes_query_and_trailing_slash() {
    let (registry, http, _) = interceptor();
    for url in [
        "https://api.example.com/users?page=2",
        "https://api.example.com/users/",
        "http://API.example.com/users",
        "https://api.example.com/users",
    ] {
        http.send(&HttpRequest::get(url)).unwrap();
    }

    // Patterns stay lenient about query and trailing slash
    assert_eq!(registry.request_count("https://api.example.com/users").unwrap(), 3);

    assert_eq!(registry.request_count_exact("https://api.example.com/users"), 1);
    assert_eq!(registry.request_count_exact("HTTPS://api.example.com:443/users"), 1);
    assert_eq!(registry.request_count_exact("https://api.example.com/users/"), 1);
    assert_eq!(registry.request_count_exact("http://api.example.com/users"), 1);
    assert_eq!(
        registry.requests_exact("https://api.example.com/users?page=2")[0].request.url,
        "https://api.example.com/users?page=2"
    );
    assert_eq!(registry.request_count_exact("https://api.example.com/users?page=3"), 0);
    assert!(registry.requests_exact("").is_empty());
}

#[test]
fn test_mocked_header_names_are_normalized() {
    let (registry, http, _) = interceptor();
    registry
        .mock_http("https://api.example.com/data")
        .unwrap()
        .and_return(json!({
            "status": 200,
            "body": "{}",
            "headers": {"Content-Type": "application/json"}
        }));

    let response = http.send(&HttpRequest::get("https://api.example.com/data")).unwrap();
    assert_eq!(response.header("content-type"), Some("application/json"));
}

#[test]
fn test_invocation_arguments_carry_the_request() {
    let (registry, http, _) = interceptor();
    let rule = registry.mock_http("https://api.example.com/*").unwrap();
    http.send(&HttpRequest::get("https://api.example.com/a").with_header("accept", "text/html"))
        .unwrap();

    let call = rule.last_call().unwrap();
    let request: HttpRequest = serde_json::from_value(call.arguments[0].clone()).unwrap();
    assert_eq!(request.headers["accept"], "text/html");
}

#[test]
fn test_passthrough_rule_reaches_real_server() {
    let mut server = Server::new();
    let remote = server
        .mock("GET", "/feed")
        .with_status(200)
        .with_body("real feed")
        .expect(1)
        .create();

    let registry = MockRegistry::new();
    let http = HttpInterceptor::new(
        registry.clone(),
        Box::new(LiveHttpTransport::new(Duration::from_secs(5)).unwrap()),
    );
    let rule = registry.mock_http(&format!("{}/feed", server.url())).unwrap();
    rule.and_passthrough().once();

    let response = http
        .send(&HttpRequest::get(format!("{}/feed", server.url())))
        .unwrap();

    remote.assert();
    assert_eq!(response.body, "real feed");
    assert!(rule.verify().is_ok());
    assert_eq!(registry.requests()[0].disposition, RequestDisposition::PassedThrough);
}
