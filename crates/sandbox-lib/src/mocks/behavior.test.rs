use super::*;
use serde_json::json;

fn detached(symbol: &str) -> MockHandle {
    MockHandle::new(
        MockBehavior::new(symbol),
        MockKey::Function(symbol.to_string()),
        Weak::new(),
        Sequence::new(),
    )
}

fn unreachable_real(_: &[Value]) -> anyhow::Result<Value> {
    panic!("real implementation must not run")
}

#[test]
fn test_default_behavior_returns_null() {
    let mock = detached("get_option");
    assert_eq!(mock.kind(), BehaviorKind::Fixed);

    let value = mock.dispatch(&[json!("siteurl")], unreachable_real).unwrap();
    assert_eq!(value, Value::Null);
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_fixed_return_records_arguments() {
    let mock = detached("get_option");
    mock.and_return("https://example.test");

    let value = mock.dispatch(&[json!("siteurl")], unreachable_real).unwrap();
    assert_eq!(value, json!("https://example.test"));
    assert!(mock.was_called_with(&[json!("siteurl")]));
    assert!(!mock.was_called_with(&[json!("home")]));

    let last = mock.last_call().unwrap();
    assert_eq!(last.argument(0), Some(&json!("siteurl")));
    assert_eq!(last.result, Ok(json!("https://example.test")));
    assert_eq!(last.occurred_at, 1);
}

#[test]
fn test_computed_return_uses_arguments() {
    let mock = detached("double");
    mock.and_return_using(|args| json!(args[0].as_i64().unwrap_or(0) * 2));

    assert_eq!(mock.dispatch(&[json!(21)], unreachable_real).unwrap(), json!(42));
    assert_eq!(mock.kind(), BehaviorKind::Computed);
}

#[test]
fn test_sequential_values_repeat_the_last_one() {
    let mock = detached("next_id");
    mock.and_return_consecutive(["a", "b", "c"]);

    let values: Vec<Value> = (0..4)
        .map(|_| mock.dispatch(&[], unreachable_real).unwrap())
        .collect();
    assert_eq!(values, vec![json!("a"), json!("b"), json!("c"), json!("c")]);
    assert_eq!(mock.call_count(), 4);
}

#[test]
fn test_empty_sequence_returns_null() {
    let mock = detached("next_id");
    mock.and_return_consecutive(Vec::<Value>::new());
    assert_eq!(mock.dispatch(&[], unreachable_real).unwrap(), Value::Null);
}

#[test]
fn test_thrown_error_is_counted_and_recorded() {
    let mock = detached("wp_remote_get");
    mock.and_throw(ThrownError::new("connection refused").with_code("http_request_failed"));

    let err = mock.dispatch(&[], unreachable_real).unwrap_err();
    let thrown = err.downcast_ref::<ThrownError>().unwrap();
    assert_eq!(thrown.message, "connection refused");
    assert_eq!(thrown.code.as_deref(), Some("http_request_failed"));

    assert_eq!(mock.call_count(), 1);
    assert_eq!(mock.last_call().unwrap().result, Err("connection refused".to_string()));
    assert!(!mock.last_call().unwrap().succeeded());
}

#[test]
fn test_passthrough_calls_real_and_records() {
    let mock = detached("sum");
    mock.and_passthrough();

    let value = mock
        .dispatch(&[json!(2), json!(3)], |args| {
            Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
        })
        .unwrap();
    assert_eq!(value, json!(5));
    assert_eq!(mock.calls().len(), 1);
    assert_eq!(mock.last_call().unwrap().result, Ok(json!(5)));
}

#[test]
fn test_last_write_wins() {
    let mock = detached("get_option");
    mock.and_throw("boom").and_return(7);

    assert_eq!(mock.kind(), BehaviorKind::Fixed);
    assert_eq!(mock.dispatch(&[], unreachable_real).unwrap(), json!(7));

    mock.times(3).at_least(1);
    assert_eq!(
        mock.expectation(),
        Expectation {
            min: Some(1),
            max: None,
            exact: None
        }
    );
}

#[test]
fn test_times_expectation() {
    let mock = detached("notify");
    mock.times(2);

    mock.dispatch(&[], unreachable_real).unwrap();
    let err = mock.verify().unwrap_err();
    assert_eq!(err.expected, Expectation::exactly(2));
    assert_eq!(err.actual, 1);
    assert_eq!(
        err.to_string(),
        "Mock expectation failed for 'notify': expected exactly 2, called 1 time(s)"
    );

    mock.dispatch(&[], unreachable_real).unwrap();
    assert!(mock.verify().is_ok());

    mock.dispatch(&[], unreachable_real).unwrap();
    assert_eq!(mock.verify().unwrap_err().actual, 3);
}

#[test]
fn test_never_expectation() {
    let mock = detached("delete_everything");
    mock.never();
    assert!(mock.verify().is_ok());

    mock.dispatch(&[], unreachable_real).unwrap();
    let err = mock.verify().unwrap_err();
    assert_eq!(err.expected.to_string(), "never");
}

#[test]
fn test_bounds_combine() {
    let mock = detached("poll");
    mock.at_least(1).at_most(2);
    assert_eq!(mock.expectation().to_string(), "between 1 and 2");
    assert!(mock.verify().is_err());

    mock.dispatch(&[], unreachable_real).unwrap();
    mock.dispatch(&[], unreachable_real).unwrap();
    assert!(mock.verify().is_ok());

    mock.dispatch(&[], unreachable_real).unwrap();
    assert!(mock.verify().is_err());
}

#[test]
fn test_unconstrained_always_verifies() {
    let mock = detached("anything");
    assert!(!mock.expectation().is_constrained());
    for _ in 0..5 {
        mock.dispatch(&[], unreachable_real).unwrap();
    }
    assert!(mock.verify().is_ok());
}

#[test]
fn test_disabled_mock_passes_through_unrecorded() {
    let mock = detached("get_option");
    mock.and_return("mocked").disable();

    let value = mock.dispatch(&[], |_| Ok(json!("real"))).unwrap();
    assert_eq!(value, json!("real"));
    assert_eq!(mock.call_count(), 0);
    assert!(!mock.is_enabled());

    mock.enable();
    assert_eq!(mock.dispatch(&[], unreachable_real).unwrap(), json!("mocked"));
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_reset_keeps_behavior() {
    let mock = detached("get_option");
    mock.and_return(1).once();
    mock.dispatch(&[], unreachable_real).unwrap();
    mock.reset();

    assert_eq!(mock.call_count(), 0);
    assert!(mock.calls().is_empty());
    assert_eq!(mock.kind(), BehaviorKind::Fixed);
    assert_eq!(mock.expectation(), Expectation::exactly(1));
}

#[test]
fn test_computed_callable_may_reenter_the_handle() {
    let mock = detached("recursive");
    let inner = mock.clone();
    mock.and_return_using(move |_| json!(inner.call_count()));

    // The count was already incremented and no borrow is held
    assert_eq!(mock.dispatch(&[], unreachable_real).unwrap(), json!(1));
}

#[test]
fn test_expectation_display() {
    assert_eq!(Expectation::exactly(2).to_string(), "exactly 2");
    assert_eq!(Expectation::default().with_min(1).to_string(), "at least 1");
    assert_eq!(Expectation::default().with_max(3).to_string(), "at most 3");
    assert_eq!(Expectation::default().to_string(), "any number of calls");
}
