use super::*;
use crate::host::{HookCallback, HttpRequest, HttpResponse};
use crate::mocks::{BehaviorKind, UnmockedRequestError};
use crate::storage::{BackendCapabilities, MemoryConnection};
use crate::testing::ManualClock;
use chrono::{TimeDelta, TimeZone, Utc};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

struct OfflineTransport;

impl HttpTransport for OfflineTransport {
    fn send(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        Ok(HttpResponse::new(503, "offline"))
    }
}

fn memory(kind: BackendKind) -> MemoryConnection {
    let connection = MemoryConnection::new(kind);
    connection.create_table("posts").unwrap();
    connection
}

fn sandbox() -> Sandbox<MemoryConnection> {
    Sandbox::builder(memory(BackendKind::Embedded))
        .http(OfflineTransport)
        .build()
        .unwrap()
}

#[test]
fn test_build_opens_root_transaction() {
    let sandbox = sandbox();
    assert_eq!(sandbox.strategy(), IsolationStrategy::Transactional);
    assert!(sandbox.isolation().is_transaction_active());
    assert_eq!(sandbox.isolation().depth(), 1);
    assert!(sandbox.storage().in_transaction());
}

#[test]
fn test_writes_do_not_leak_between_tests() {
    let mut sandbox = sandbox();

    sandbox.before_each("writes").unwrap();
    sandbox.storage().put("posts", "1", json!("hello")).unwrap();
    assert_eq!(sandbox.isolation().depth(), 2);
    sandbox.after_each().unwrap();

    sandbox.before_each("reads").unwrap();
    assert_eq!(sandbox.storage().count("posts"), 0);
    sandbox.after_each().unwrap();
    assert_eq!(sandbox.isolation().depth(), 1);
}

#[test]
fn test_helper_savepoints_are_discarded_at_teardown() {
    let mut sandbox = sandbox();
    sandbox.before_each("nested").unwrap();
    sandbox.storage().put("posts", "1", json!("a")).unwrap();
    let step = sandbox.create_savepoint(Some("step_two")).unwrap();
    sandbox.storage().put("posts", "2", json!("b")).unwrap();
    sandbox.create_savepoint(None).unwrap();

    sandbox.rollback(Some(&step)).unwrap();
    assert_eq!(sandbox.storage().keys("posts"), vec!["1".to_string()]);
    assert_eq!(sandbox.isolation().depth(), 3);

    sandbox.after_each().unwrap();
    assert_eq!(sandbox.isolation().depth(), 1);
    assert_eq!(sandbox.storage().count("posts"), 0);
}

#[test]
fn test_teardown_verifies_before_rollback_and_clears_after() {
    let mut sandbox = sandbox();
    sandbox.before_each("expectation").unwrap();
    sandbox.mock_function("notify").once();
    sandbox.storage().put("posts", "1", json!("kept until rollback")).unwrap();

    let err = sandbox.after_each().unwrap_err();
    let SandboxError::Expectation(verification) = err else {
        panic!("expected an expectation failure");
    };
    assert_eq!(verification.failures[0].symbol, "notify");
    assert_eq!(verification.failures[0].actual, 0);

    assert_eq!(sandbox.storage().count("posts"), 0);
    assert!(sandbox.registry().is_empty());
    assert!(sandbox.current_test().is_none());
}

#[test]
fn test_verification_and_cleanup_failures_are_both_reported() {
    let mut sandbox = sandbox();
    sandbox.before_each("broken").unwrap();
    sandbox.mock_function("notify").once();
    sandbox.storage().set_reachable(false);

    let err = sandbox.after_each().unwrap_err();
    match err {
        SandboxError::TeardownFailed {
            verification,
            cleanup,
        } => {
            assert_eq!(verification.failures.len(), 1);
            assert!(matches!(*cleanup, SandboxError::Transaction(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(sandbox.registry().is_empty());
    sandbox.storage().set_reachable(true);
}

#[test]
fn test_lifecycle_misuse() {
    let mut sandbox = sandbox();
    assert!(matches!(sandbox.after_each(), Err(SandboxError::NoActiveTest)));

    sandbox.before_each("first").unwrap();
    assert!(matches!(
        sandbox.before_each("second"),
        Err(SandboxError::TestAlreadyActive { name }) if name == "first"
    ));
    assert_eq!(sandbox.current_test(), Some("first"));
}

#[test]
fn test_host_services_route_through_interceptors() {
    let functions = FunctionTable::new().with("site_name", |_| Ok(json!("Live Site")));
    let live_clock = ManualClock::new(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
    let mut sandbox = Sandbox::builder(memory(BackendKind::Embedded))
        .functions(functions)
        .http(OfflineTransport)
        .clock(live_clock.clone())
        .build()
        .unwrap();

    sandbox
        .run_test("routing", |sb| {
            assert_eq!(sb.functions().call("site_name", &[])?, json!("Live Site"));
            sb.mock_function("site_name").and_return("Mocked").once();
            assert_eq!(sb.functions().call("site_name", &[])?, json!("Mocked"));

            let upper = HookCallback::new("upper", |a| {
                Ok(json!(a[0].as_str().unwrap_or("").to_uppercase()))
            });
            sb.hooks().add_filter("title", upper, 10);
            sb.mock_hook("title").and_return("override");
            assert_eq!(sb.hooks().apply_filters("title", json!("x"), &[])?, json!("override"));

            sb.mock_http("https://api.example.com/*")?
                .and_respond(HttpResponse::ok("mocked"));
            let mocked = sb.http().send(&HttpRequest::get("https://api.example.com/a"))?;
            assert_eq!(mocked.body, "mocked");
            let live = sb.http().send(&HttpRequest::get("https://other.test/"))?;
            assert_eq!(live.status, 503);

            sb.time().freeze_at_str("2024-01-15 10:30:00")?;
            let frozen = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
            assert_eq!(sb.clock().now(), frozen);
            Ok(())
        })
        .unwrap();

    // Everything reverted to live behavior
    assert_eq!(sandbox.functions().call("site_name", &[]).unwrap(), json!("Live Site"));
    assert_eq!(sandbox.clock().now(), live_clock.now());
    assert_eq!(
        sandbox.hooks().apply_filters("title", json!("x"), &[]).unwrap(),
        json!("X")
    );
}

#[test]
fn test_block_unmatched_default_comes_from_config() {
    let config = SandboxConfig {
        block_unmatched: true,
        ..SandboxConfig::default()
    };
    let mut sandbox = Sandbox::builder(memory(BackendKind::Embedded))
        .config(config)
        .http(OfflineTransport)
        .build()
        .unwrap();

    let err = sandbox
        .run_test("leaky", |sb| {
            sb.http().send(&HttpRequest::get("https://leak.test/"))?;
            Ok(())
        })
        .unwrap_err();
    let SandboxError::TestFailed { source, .. } = err else {
        panic!("expected the test body to fail");
    };
    assert!(source.downcast_ref::<UnmockedRequestError>().is_some());

    sandbox.before_each("next").unwrap();
    sandbox.registry().allow_unmatched();
    sandbox.after_each().unwrap();
    assert!(sandbox.registry().is_blocking_unmatched());
}

#[test]
fn test_run_test_tears_down_after_panic() {
    let mut sandbox = sandbox();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = sandbox.run_test("panics", |sb| {
            sb.storage().put("posts", "1", json!("leak?"))?;
            sb.mock_function("anything").and_return(1);
            panic!("boom");
        });
    }));

    assert!(result.is_err());
    assert!(sandbox.current_test().is_none());
    assert_eq!(sandbox.storage().count("posts"), 0);
    assert!(sandbox.registry().is_empty());
}

#[test]
fn test_reseed_fallback_on_backend_without_transactional_ddl() {
    let config = SandboxConfig {
        require_transactional_ddl: true,
        ..SandboxConfig::default()
    };
    let reseeds = Rc::new(Cell::new(0));
    let counter = Rc::clone(&reseeds);
    let mut sandbox = Sandbox::builder(memory(BackendKind::ClientServer))
        .config(config)
        .http(OfflineTransport)
        .reseed(move |connection: &MemoryConnection| {
            counter.set(counter.get() + 1);
            connection.truncate("posts")?;
            connection.put("posts", "seed", json!("fixture"))?;
            Ok(())
        })
        .build()
        .unwrap();

    assert_eq!(sandbox.strategy(), IsolationStrategy::Reseed);
    assert!(!sandbox.isolation().is_transaction_active());

    sandbox
        .run_test("writes", |sb| {
            sb.storage().put("posts", "1", json!("hello"))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(reseeds.get(), 1);
    assert_eq!(sandbox.storage().keys("posts"), vec!["seed".to_string()]);
}

#[test]
fn test_unavailable_backend_without_reseed_fails() {
    let connection = memory(BackendKind::ClientServer).with_capabilities(BackendCapabilities {
        nested_savepoints: false,
        transactional_ddl: false,
        autocommit_control: true,
    });
    let result = Sandbox::builder(connection).http(OfflineTransport).build();
    assert!(matches!(
        result,
        Err(SandboxError::NoIsolationStrategy {
            backend: BackendKind::ClientServer
        })
    ));
}

#[test]
fn test_unreachable_backend_is_reported() {
    let connection = memory(BackendKind::Embedded);
    connection.set_reachable(false);
    let result = Sandbox::builder(connection).http(OfflineTransport).build();
    assert!(matches!(
        result,
        Err(SandboxError::Transaction(TransactionError::BackendUnreachable { .. }))
    ));
}

#[test]
fn test_clock_expectations_are_verified_at_teardown() {
    let mut sandbox = sandbox();
    sandbox.before_each("clock").unwrap();
    let clock = sandbox.time().freeze_at_str("2024-01-15 10:30:00").unwrap();
    clock.at_least(1);
    assert_eq!(clock.kind(), BehaviorKind::Passthrough);

    sandbox.time().advance(TimeDelta::hours(1)).unwrap();
    assert_eq!(
        sandbox.clock().now(),
        Utc.with_ymd_and_hms(2024, 1, 15, 11, 30, 0).unwrap()
    );
    sandbox.after_each().unwrap();
    assert!(!sandbox.time().is_frozen());
}

#[test]
fn test_finish_rolls_back_root() {
    let mut sandbox = sandbox();
    sandbox.before_each("unfinished").unwrap();
    sandbox.storage().put("posts", "1", json!("x")).unwrap();

    sandbox.finish().unwrap();
}

#[test]
fn test_from_config_opens_embedded_sqlite() {
    let sandbox = Sandbox::from_config(SandboxConfig::default()).unwrap();
    assert_eq!(sandbox.strategy(), IsolationStrategy::Transactional);
    assert!(sandbox.storage().path().is_none());
}

#[test]
fn test_from_config_rejects_client_server_without_connection() {
    let config = SandboxConfig {
        backend: BackendKind::ClientServer,
        ..SandboxConfig::default()
    };
    assert!(matches!(
        Sandbox::from_config(config),
        Err(SandboxError::Config(ConfigError::UnsupportedBackend { .. }))
    ));
}
