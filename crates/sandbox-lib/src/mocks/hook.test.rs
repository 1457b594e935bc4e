use super::*;
use crate::host::LiveEventBus;
use serde_json::json;
use std::cell::Cell;

fn interceptor() -> (MockRegistry, HookInterceptor) {
    let registry = MockRegistry::new();
    let hooks = HookInterceptor::new(registry.clone(), Box::new(LiveEventBus::new()));
    (registry, hooks)
}

fn shout() -> HookCallback {
    HookCallback::new("shout", |args| {
        Ok(json!(args[0].as_str().unwrap_or_default().to_uppercase()))
    })
}

#[test]
fn test_without_mocks_dispatch_is_live() {
    let (_registry, hooks) = interceptor();
    hooks.add_filter("the_title", shout(), 10);
    assert_eq!(
        hooks.apply_filters("the_title", json!("hello"), &[]).unwrap(),
        json!("HELLO")
    );
}

#[test]
fn test_capture_records_wiring_without_changing_dispatch() {
    let (registry, hooks) = interceptor();
    let capture = registry.capture_hook("the_title");

    hooks.add_filter("the_title", shout(), 10);
    hooks.add_filter("the_title", HookCallback::new("trim", |a| Ok(a[0].clone())).accepting(2), 5);

    assert_eq!(capture.count(), 2);
    assert!(capture.has_callback("shout"));
    assert_eq!(capture.priority_of("shout"), Some(10));
    assert_eq!(capture.priority_of("trim"), Some(5));
    assert_eq!(capture.registrations()[1].accepted_args, 2);
    assert!(capture.registrations()[0].occurred_at < capture.registrations()[1].occurred_at);

    assert_eq!(
        hooks.apply_filters("the_title", json!("hello"), &[]).unwrap(),
        json!("HELLO")
    );
    assert_eq!(hooks.has_filter("the_title", "shout"), Some(10));
}

#[test]
fn test_capture_tracks_removal() {
    let (registry, hooks) = interceptor();
    let capture = registry.capture_hook("init");
    hooks.add_action("init", HookCallback::new("boot", |_| Ok(Value::Null)), 10);

    assert!(hooks.remove_filter("init", "boot", 10));
    assert!(!capture.has_callback("boot"));
    assert_eq!(capture.count(), 0);
    assert_eq!(capture.registrations().len(), 1);
    assert!(capture.registrations()[0].removed);
}

#[test]
fn test_override_replaces_filtered_value() {
    let (registry, hooks) = interceptor();
    hooks.add_filter("the_title", shout(), 10);
    let title = registry.mock_hook("the_title");
    title.and_return("Mocked").once();

    let value = hooks
        .apply_filters("the_title", json!("hello"), &[json!(42)])
        .unwrap();
    assert_eq!(value, json!("Mocked"));
    assert!(title.was_called_with(&[json!("hello"), json!(42)]));
    assert!(title.verify().is_ok());
}

#[test]
fn test_override_defaults_to_passthrough() {
    let (registry, hooks) = interceptor();
    hooks.add_filter("the_title", shout(), 10);
    let title = registry.mock_hook("the_title");
    assert_eq!(title.kind(), crate::mocks::BehaviorKind::Passthrough);

    let value = hooks.apply_filters("the_title", json!("hi"), &[]).unwrap();
    assert_eq!(value, json!("HI"));
    assert_eq!(title.call_count(), 1);
    assert_eq!(title.last_call().unwrap().result, Ok(json!("HI")));
}

#[test]
fn test_capture_and_override_coexist() {
    let (registry, hooks) = interceptor();
    let capture = registry.capture_hook("the_title");
    let title = registry.mock_hook("the_title");
    title.and_return_using(|args| json!(format!("[{}]", args[0].as_str().unwrap_or(""))));

    hooks.add_filter("the_title", shout(), 10);
    let value = hooks.apply_filters("the_title", json!("x"), &[]).unwrap();

    assert_eq!(value, json!("[x]"));
    assert!(capture.has_callback("shout"));
    assert_eq!(title.call_count(), 1);
}

#[test]
fn test_action_override_suppresses_callbacks_unless_passthrough() {
    let (registry, hooks) = interceptor();
    let fired = Rc::new(Cell::new(0));
    let counter = Rc::clone(&fired);
    hooks.add_action(
        "publish_post",
        HookCallback::new("notify", move |_| {
            counter.set(counter.get() + 1);
            Ok(Value::Null)
        }),
        10,
    );

    let publish = registry.mock_hook("publish_post");
    publish.and_return(Value::Null);
    hooks.do_action("publish_post", &[json!(7)]).unwrap();
    assert_eq!(fired.get(), 0);

    publish.and_passthrough();
    hooks.do_action("publish_post", &[json!(8)]).unwrap();
    assert_eq!(fired.get(), 1);
    assert_eq!(publish.call_count(), 2);
    assert!(publish.was_called_with(&[json!(7)]));
}

#[test]
fn test_override_error_surfaces_to_caller() {
    let (registry, hooks) = interceptor();
    registry.mock_hook("save_post").and_throw("database is locked");

    let err = hooks.do_action("save_post", &[]).unwrap_err();
    assert_eq!(err.to_string(), "database is locked");
}

#[test]
fn test_restore_resumes_live_dispatch() {
    let (registry, hooks) = interceptor();
    hooks.add_filter("the_title", shout(), 10);
    let title = registry.mock_hook("the_title");
    title.and_return("mocked");
    title.restore();

    assert!(registry.hook("the_title").is_none());
    assert_eq!(
        hooks.apply_filters("the_title", json!("live"), &[]).unwrap(),
        json!("LIVE")
    );
}
