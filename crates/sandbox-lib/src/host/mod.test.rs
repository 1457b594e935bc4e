use super::*;
use serde_json::json;

#[test]
fn test_callback_receives_at_most_accepted_args() {
    let callback = HookCallback::new("count_args", |args| Ok(json!(args.len())));
    let args = [json!("value"), json!(1), json!(2)];

    assert_eq!(callback.call(&args).unwrap(), json!(1));
    assert_eq!(callback.clone().accepting(2).call(&args).unwrap(), json!(2));
    assert_eq!(callback.accepting(10).call(&args).unwrap(), json!(3));
}

#[test]
fn test_request_builders() {
    let request = HttpRequest::post("https://example.com/hook", "{}")
        .with_header("content-type", "application/json");
    assert_eq!(request.method, "POST");
    assert_eq!(request.body.as_deref(), Some("{}"));
    assert_eq!(request.headers["content-type"], "application/json");

    assert_eq!(HttpRequest::new("delete", "https://example.com").method, "DELETE");
}

#[test]
fn test_response_helpers() {
    let response = HttpResponse::json(&json!({"ok": true})).with_header("X-Trace", "abc");
    assert!(response.is_success());
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.header("x-trace"), Some("abc"));
    assert_eq!(response.json_body().unwrap(), json!({"ok": true}));

    assert!(!HttpResponse::new(404, "").is_success());
    assert!(HttpResponse::ok("not json").json_body().is_err());
}

#[test]
fn test_response_deserializes_with_defaults() {
    let response: HttpResponse = serde_json::from_value(json!({"body": "hi"})).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hi");
    assert!(response.headers.is_empty());

    let response: HttpResponse = serde_json::from_value(json!({"status": 503})).unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.body, "");
}

#[test]
fn test_deserialized_header_names_are_case_insensitive() {
    let response: HttpResponse = serde_json::from_value(json!({
        "headers": {"Content-Type": "application/json", "X-Request-Id": "42"}
    }))
    .unwrap();
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.header("X-REQUEST-ID"), Some("42"));
    assert!(response.headers.contains_key("x-request-id"));
}

#[test]
fn test_request_serializes_for_mock_arguments() {
    let value = serde_json::to_value(HttpRequest::get("https://example.com")).unwrap();
    assert_eq!(value["method"], "GET");
    assert_eq!(value["url"], "https://example.com");
    assert_eq!(value["body"], Value::Null);
}
