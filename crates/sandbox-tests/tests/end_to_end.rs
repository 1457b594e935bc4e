//! Four consecutive tests sharing one sandbox, as a test runner would drive them

use anyhow::Result;
use sandbox_lib::{HostServices, SandboxError};
use sandbox_tests::{Blog, sqlite_sandbox};
use serde_json::json;

#[test]
fn test_consecutive_tests_leave_no_residue() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    let mut created = None;

    // Test A: create a record and see it
    sandbox.run_test("A creates a post", |sb| {
        let blog = Blog::new(&*sb);
        let id = blog.create_post("Hello", "First post")?;
        assert_eq!(blog.post(id)?.map(|p| p.title), Some("Hello".to_string()));
        created = Some(id);
        Ok(())
    })?;
    let id = created.expect("test A ran");

    // Test B: the record is gone
    sandbox.run_test("B cannot see it", |sb| {
        let blog = Blog::new(&*sb);
        assert_eq!(blog.post(id)?, None);
        assert_eq!(blog.count()?, 0);
        Ok(())
    })?;

    // Test C: an expectation that is never met fails that test only
    let failure = sandbox
        .run_test("C expects a call", |sb| {
            sb.mock_function("send_welcome_email").once();
            Ok(())
        })
        .unwrap_err();
    match failure {
        SandboxError::Expectation(verification) => {
            assert_eq!(verification.failures.len(), 1);
            assert_eq!(verification.failures[0].symbol, "send_welcome_email");
            assert_eq!(verification.failures[0].actual, 0);
        }
        other => panic!("test C failed for the wrong reason: {other}"),
    }

    // Test D: runs cleanly because C's mocks were cleared
    sandbox.run_test("D runs cleanly", |sb| {
        assert!(sb.registry().is_empty());
        assert!(!sb.functions().exists("send_welcome_email"));
        let blog = Blog::new(&*sb);
        blog.create_post("Fresh", "")?;
        assert_eq!(blog.count()?, 1);
        Ok(())
    })?;

    sandbox.finish()?;
    Ok(())
}

#[test]
fn test_mocked_failure_follows_the_real_error_path() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("notification outage", |sb| {
        sb.mock_function("notify_subscribers")
            .and_throw("mail server unavailable")
            .once();

        let blog = Blog::new(&*sb);
        let err = blog.create_post("Doomed", "").unwrap_err();
        assert_eq!(err.to_string(), "mail server unavailable");
        // The insert happened before the failure and is still visible here
        assert_eq!(blog.count()?, 1);
        Ok(())
    })?;

    sandbox.run_test("after outage", |sb| {
        assert_eq!(Blog::new(&*sb).count()?, 0);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_mock_arguments_are_inspectable() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("notification payload", |sb| {
        let notify = sb.mock_function("notify_subscribers");
        notify.and_passthrough().once();

        let id = Blog::new(&*sb).create_post("  Spaced  ", "")?;

        assert!(notify.was_called_with(&[json!(id), json!("  Spaced  ")]));
        assert_eq!(
            notify.last_call().and_then(|c| c.result.ok()),
            Some(json!({"post": id, "title": "  Spaced  "}))
        );
        Ok(())
    })?;
    Ok(())
}
