use super::*;
use crate::host::FunctionTable;
use crate::mocks::{ThrownError, UndefinedFunctionError};
use serde_json::json;

fn interceptor() -> (MockRegistry, FunctionInterceptor) {
    let registry = MockRegistry::new();
    let live = FunctionTable::new()
        .with("current_user", |_| Ok(json!("admin")))
        .with("slugify", |args| {
            Ok(json!(args[0].as_str().unwrap_or_default().to_lowercase().replace(' ', "-")))
        });
    let functions = FunctionInterceptor::new(registry.clone(), Box::new(live));
    (registry, functions)
}

#[test]
fn test_unmocked_call_reaches_live_function() {
    let (_registry, functions) = interceptor();
    assert_eq!(functions.call("current_user", &[]).unwrap(), json!("admin"));
}

#[test]
fn test_mocked_call_returns_configured_value() {
    let (registry, functions) = interceptor();
    let user = registry.mock_function("current_user");
    user.and_return("editor").once();

    assert_eq!(functions.call("current_user", &[]).unwrap(), json!("editor"));
    assert!(registry.verify_all().is_ok());
}

#[test]
fn test_arguments_reach_computed_return_untouched() {
    let (registry, functions) = interceptor();
    registry
        .mock_function("slugify")
        .and_return_using(|args| json!(args.len()));

    let args = [json!("Hello World"), json!({"strict": true}), Value::Null];
    assert_eq!(functions.call("slugify", &args).unwrap(), json!(3));
    assert!(registry.function("slugify").unwrap().was_called_with(&args));
}

#[test]
fn test_mock_can_define_a_missing_function() {
    let (registry, functions) = interceptor();
    assert!(!functions.exists("send_mail"));

    registry.mock_function("send_mail").and_return(true);
    assert!(functions.exists("send_mail"));
    assert_eq!(functions.call("send_mail", &[]).unwrap(), json!(true));
}

#[test]
fn test_undefined_function_error() {
    let (_registry, functions) = interceptor();
    let err = functions.call("send_mail", &[json!("a@b.c")]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<UndefinedFunctionError>(),
        Some(&UndefinedFunctionError {
            name: "send_mail".to_string()
        })
    );
}

#[test]
fn test_thrown_error_looks_like_real_failure() {
    let (registry, functions) = interceptor();
    registry
        .mock_function("current_user")
        .and_throw(ThrownError::new("session expired").with_code("auth"));

    let err = functions.call("current_user", &[]).unwrap_err();
    assert_eq!(err.downcast_ref::<ThrownError>().and_then(|e| e.code.as_deref()), Some("auth"));
}

#[test]
fn test_passthrough_records_live_results() {
    let (registry, functions) = interceptor();
    let slugify = registry.mock_function("slugify");
    slugify.and_passthrough().twice();

    functions.call("slugify", &[json!("A B")]).unwrap();
    functions.call("slugify", &[json!("C D")]).unwrap();

    let results: Vec<_> = slugify.calls().into_iter().map(|c| c.result).collect();
    assert_eq!(results, vec![Ok(json!("a-b")), Ok(json!("c-d"))]);
    assert!(slugify.verify().is_ok());
}

#[test]
fn test_disabled_mock_calls_through_without_recording() {
    let (registry, functions) = interceptor();
    let user = registry.mock_function("current_user");
    user.and_return("editor");
    functions.call("current_user", &[]).unwrap();

    user.disable();
    assert_eq!(functions.call("current_user", &[]).unwrap(), json!("admin"));
    assert_eq!(user.call_count(), 1);

    user.enable();
    assert_eq!(functions.call("current_user", &[]).unwrap(), json!("editor"));
    assert_eq!(user.call_count(), 2);
}

#[test]
fn test_registering_twice_returns_the_same_mock() {
    let (registry, functions) = interceptor();
    registry.mock_function("current_user").and_return("first");
    registry.mock_function("current_user").times(1);

    assert_eq!(functions.call("current_user", &[]).unwrap(), json!("first"));
    assert!(registry.verify_all().is_ok());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_clear_all_restores_live_behavior() {
    let (registry, functions) = interceptor();
    registry.mock_function("current_user").and_return("editor");
    registry.clear_all();

    assert!(registry.is_empty());
    assert_eq!(functions.call("current_user", &[]).unwrap(), json!("admin"));
}
