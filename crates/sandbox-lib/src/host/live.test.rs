use super::*;
use mockito::Server;
use serde_json::json;

#[test]
fn test_function_table_calls_registered_function() {
    let table = FunctionTable::new().with("add", |args| {
        Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
    });

    assert!(table.exists("add"));
    assert_eq!(table.call("add", &[json!(2), json!(40)]).unwrap(), json!(42));
    assert_eq!(table.names(), vec!["add".to_string()]);

    assert!(table.unregister("add"));
    assert!(!table.exists("add"));
}

#[test]
fn test_function_table_unknown_name() {
    let table = FunctionTable::new();
    let err = table.call("missing", &[]).unwrap_err();
    let undefined = err.downcast_ref::<UndefinedFunctionError>().unwrap();
    assert_eq!(undefined.name, "missing");
}

#[test]
fn test_event_bus_runs_filters_by_priority_then_order() {
    let bus = LiveEventBus::new();
    let append = |suffix: &'static str| {
        move |args: &[Value]| -> anyhow::Result<Value> {
            Ok(json!(format!("{}{suffix}", args[0].as_str().unwrap_or(""))))
        }
    };
    bus.add_filter("title", HookCallback::new("late", append("-late")), 20);
    bus.add_filter("title", HookCallback::new("first", append("-first")), 10);
    bus.add_filter("title", HookCallback::new("second", append("-second")), 10);

    let value = bus.apply_filters("title", json!("post"), &[]).unwrap();
    assert_eq!(value, json!("post-first-second-late"));
    assert_eq!(bus.has_filter("title", "late"), Some(20));
    assert_eq!(bus.callback_count("title"), 3);
}

#[test]
fn test_event_bus_without_callbacks_returns_value() {
    let bus = LiveEventBus::new();
    assert_eq!(bus.apply_filters("nothing", json!(7), &[]).unwrap(), json!(7));
    assert!(bus.do_action("nothing", &[]).is_ok());
}

#[test]
fn test_event_bus_remove_filter_needs_matching_priority() {
    let bus = LiveEventBus::new();
    bus.add_filter("title", HookCallback::new("upper", |a| Ok(a[0].clone())), 10);

    assert!(!bus.remove_filter("title", "upper", 5));
    assert!(bus.remove_filter("title", "upper", 10));
    assert_eq!(bus.has_filter("title", "upper"), None);
    assert!(!bus.remove_filter("unknown", "upper", 10));
}

#[test]
fn test_event_bus_passes_extra_arguments() {
    let bus = LiveEventBus::new();
    bus.add_filter(
        "excerpt",
        HookCallback::new("truncate", |args| {
            let text = args[0].as_str().unwrap_or_default();
            let len = args[1].as_u64().unwrap_or(0) as usize;
            Ok(json!(text.chars().take(len).collect::<String>()))
        })
        .accepting(2),
        10,
    );

    let value = bus
        .apply_filters("excerpt", json!("hello world"), &[json!(5)])
        .unwrap();
    assert_eq!(value, json!("hello"));
}

#[test]
fn test_action_callbacks_may_register_more_callbacks() {
    let bus = Rc::new(LiveEventBus::new());
    let inner = Rc::clone(&bus);
    bus.add_action(
        "init",
        HookCallback::new("register_late", move |_| {
            inner.add_action("init", HookCallback::new("late", |_| Ok(Value::Null)), 99);
            Ok(Value::Null)
        }),
        10,
    );

    bus.do_action("init", &[]).unwrap();
    assert_eq!(bus.has_filter("init", "late"), Some(99));
}

#[test]
fn test_action_error_names_the_callback() {
    let bus = LiveEventBus::new();
    bus.add_action(
        "save_post",
        HookCallback::new("explode", |_| anyhow::bail!("disk full")),
        10,
    );

    let err = bus.do_action("save_post", &[]).unwrap_err();
    assert!(format!("{err:#}").contains("explode"));
    assert!(format!("{err:#}").contains("disk full"));
}

#[test]
fn test_live_transport_sends_request() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/ingest")
        .match_header("x-api-key", "secret")
        .match_body("payload")
        .with_status(201)
        .with_header("content-type", "text/plain")
        .with_body("created")
        .create();

    let transport = LiveHttpTransport::new(Duration::from_secs(5)).unwrap();
    let request = HttpRequest::post(format!("{}/ingest", server.url()), "payload")
        .with_header("x-api-key", "secret");
    let response = transport.send(&request).unwrap();

    mock.assert();
    assert_eq!(response.status, 201);
    assert_eq!(response.body, "created");
    assert_eq!(response.header("content-type"), Some("text/plain"));
}

#[test]
fn test_live_transport_rejects_invalid_method() {
    let transport = LiveHttpTransport::new(Duration::from_secs(1)).unwrap();
    let request = HttpRequest::new("BAD METHOD", "http://127.0.0.1:9/");
    assert!(transport.send(&request).is_err());
}

#[test]
fn test_system_clock_is_close_to_now() {
    let before = Utc::now();
    let now = SystemClock.now();
    assert!(now >= before);
    assert!(SystemClock.timestamp() >= before.timestamp());
}
