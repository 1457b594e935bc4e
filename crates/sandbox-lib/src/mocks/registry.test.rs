use super::*;
use serde_json::json;

fn unreachable_real(_: &[serde_json::Value]) -> anyhow::Result<serde_json::Value> {
    panic!("real implementation must not run")
}

#[test]
fn test_new_registry_is_empty_and_allows_unmatched() {
    let registry = MockRegistry::new();
    assert!(registry.is_empty());
    assert!(!registry.is_blocking_unmatched());
    assert!(registry.verify_all().is_ok());
}

#[test]
fn test_registration_is_idempotent_per_symbol() {
    let registry = MockRegistry::new();
    let first = registry.mock_function("get_option");
    let second = registry.mock_function("get_option");
    first.and_return(1);

    assert_eq!(second.dispatch(&[], unreachable_real).unwrap(), json!(1));
    assert_eq!(first.call_count(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_functions_and_hooks_use_separate_namespaces() {
    let registry = MockRegistry::new();
    registry.mock_function("init").and_return("function");
    registry.mock_hook("init");

    assert_eq!(registry.len(), 2);
    assert!(registry.clear_function("init"));
    assert!(registry.hook("init").is_some());
    assert!(!registry.clear_function("init"));
}

#[test]
fn test_verify_all_reports_every_failure() {
    let registry = MockRegistry::new();
    registry.mock_function("a").once();
    registry.mock_function("b").at_least(2);
    registry.mock_function("c").never();

    let err = registry.verify_all().unwrap_err();
    let symbols: Vec<_> = err.failures.iter().map(|f| f.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["a", "b"]);

    let message = err.to_string();
    assert!(message.starts_with("2 mock expectation(s) failed"));
    assert!(message.contains("'b': expected at least 2, called 0 time(s)"));
}

#[test]
fn test_clear_all_empties_everything_and_resets_switch() {
    let registry = MockRegistry::with_block_unmatched(false);
    registry.mock_function("a").once();
    registry.mock_hook("h");
    registry.capture_hook("h");
    registry.mock_http("https://example.com/*").unwrap();
    registry.clock_handle();
    registry.block_unmatched();

    registry.clear_all();

    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert!(registry.function("a").is_none());
    assert!(registry.capture("h").is_none());
    assert!(registry.requests().is_empty());
    assert!(!registry.is_blocking_unmatched());
    assert!(registry.verify_all().is_ok());
}

#[test]
fn test_blocking_default_survives_clear() {
    let registry = MockRegistry::with_block_unmatched(true);
    assert!(registry.is_blocking_unmatched());
    registry.allow_unmatched();
    registry.clear_all();
    assert!(registry.is_blocking_unmatched());
}

#[test]
fn test_restore_removes_only_that_mock() {
    let registry = MockRegistry::new();
    let a = registry.mock_function("a");
    registry.mock_function("b");
    let rule = registry.mock_http("https://example.com/*").unwrap();

    a.restore();
    rule.restore();

    assert!(registry.function("a").is_none());
    assert!(registry.function("b").is_some());
    assert!(registry.match_http("GET", "https://example.com/x").is_none());
}

#[test]
fn test_stale_handle_does_not_restore_newer_mock() {
    let registry = MockRegistry::new();
    let old = registry.mock_function("f");
    registry.clear_all();
    let new = registry.mock_function("f");
    new.once();

    old.restore();

    let current = registry.function("f").unwrap();
    assert!(current.is_same_mock(&new));
    let err = registry.verify_all().unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].symbol, "f");

    new.restore();
    assert!(registry.function("f").is_none());
}

#[test]
fn test_restore_after_registry_dropped_is_harmless() {
    let handle = {
        let registry = MockRegistry::new();
        registry.mock_function("orphan")
    };
    handle.restore();
    assert_eq!(handle.call_count(), 0);
}

#[test]
fn test_clear_hook_removes_override_and_capture() {
    let registry = MockRegistry::new();
    registry.capture_hook("init");
    assert!(registry.clear_hook("init"));
    assert!(registry.capture("init").is_none());

    registry.mock_hook("init");
    assert!(registry.clear_hook("init"));
    assert!(!registry.clear_hook("init"));
}

#[test]
fn test_clear_http_by_pattern_text() {
    let registry = MockRegistry::new();
    registry.mock_http("https://example.com/*").unwrap();
    registry
        .mock_http_method("POST", "https://example.com/*")
        .unwrap();

    assert!(registry.clear_http("https://example.com/*").unwrap());
    assert!(!registry.clear_http("https://example.com/*").unwrap());
    assert!(registry.clear_http("bad/*/*").is_err());
}

#[test]
fn test_invalid_pattern_is_rejected_at_registration() {
    let registry = MockRegistry::new();
    assert!(matches!(
        registry.mock_http("https://*.example.com/*"),
        Err(PatternError::MultipleWildcards { .. })
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_match_http_respects_method_and_order() {
    let registry = MockRegistry::new();
    registry
        .mock_http_method("delete", "https://example.com/posts/*")
        .unwrap();
    registry.mock_http("https://example.com/*").unwrap();

    let (pattern, _) = registry
        .match_http("DELETE", "https://example.com/posts/1")
        .unwrap();
    assert_eq!(pattern, "https://example.com/posts/*");

    let (pattern, _) = registry
        .match_http("GET", "https://example.com/posts/1")
        .unwrap();
    assert_eq!(pattern, "https://example.com/*");
}

#[test]
fn test_sequence_is_shared_across_mocks() {
    let registry = MockRegistry::new();
    let a = registry.mock_function("a");
    let b = registry.mock_function("b");

    a.dispatch(&[], unreachable_real).unwrap();
    b.dispatch(&[], unreachable_real).unwrap();
    a.dispatch(&[], unreachable_real).unwrap();

    let order: Vec<u64> = a
        .calls()
        .iter()
        .chain(b.calls().iter())
        .map(|c| c.occurred_at)
        .collect();
    assert_eq!(order, vec![1, 3, 2]);
    assert_eq!(registry.sequence().current(), 3);
}
