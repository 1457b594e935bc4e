//! Hook wiring, filter overrides and function mocks on the blog

use anyhow::Result;
use sandbox_lib::mocks::BehaviorKind;
use sandbox_lib::{HookCallback, HostServices};
use sandbox_tests::blog::hooks;
use sandbox_tests::{Blog, sqlite_sandbox};
use serde_json::{Value, json};

#[test]
fn test_default_filters_are_wired_at_expected_priority() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("wiring", |sb| {
        let capture = sb.capture_hook(hooks::POST_TITLE);
        Blog::new(&*sb).register_default_filters();

        assert!(capture.has_callback("trim_title"));
        assert_eq!(capture.priority_of("trim_title"), Some(10));
        assert_eq!(capture.count(), 1);

        // Capture does not change dispatch
        let id = Blog::new(&*sb).create_post("  Padded  ", "")?;
        assert_eq!(Blog::new(&*sb).post(id)?.map(|p| p.title), Some("Padded".to_string()));
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_title_filter_override() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("override", |sb| {
        let blog = Blog::new(&*sb);
        blog.register_default_filters();

        let title = sb.mock_hook(hooks::POST_TITLE);
        title.and_return_using(|args| json!(format!("[{}]", args[0].as_str().unwrap_or(""))));

        let id = blog.create_post("Raw", "")?;
        assert_eq!(blog.post(id)?.map(|p| p.title), Some("[Raw]".to_string()));
        assert_eq!(title.call_count(), 1);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_filter_override_with_passthrough_counts_calls() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("passthrough", |sb| {
        let blog = Blog::new(&*sb);
        blog.register_default_filters();
        let title = sb.mock_hook(hooks::POST_TITLE);
        assert_eq!(title.kind(), BehaviorKind::Passthrough);
        title.twice();

        blog.create_post(" a ", "")?;
        blog.create_post(" b ", "")?;
        let results: Vec<Value> = title.calls().into_iter().filter_map(|c| c.result.ok()).collect();
        assert_eq!(results, vec![json!("a"), json!("b")]);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_action_listeners_can_be_suppressed() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("silent creation", |sb| {
        sb.hooks().add_action(
            hooks::POST_CREATED,
            HookCallback::new("explode", |_| anyhow::bail!("listener should not run")),
            10,
        );
        sb.mock_hook(hooks::POST_CREATED).and_return(Value::Null).once();

        Blog::new(&*sb).create_post("Quiet", "")?;
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_site_name_from_mocked_option() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("live option", |sb| {
        assert_eq!(Blog::new(&*sb).site_name()?, "Sandbox Blog");
        Ok(())
    })?;
    sandbox.run_test("mocked option", |sb| {
        sb.mock_function("get_option")
            .and_return_consecutive(["First", "Second"]);
        let blog = Blog::new(&*sb);
        assert_eq!(blog.site_name()?, "First");
        assert_eq!(blog.site_name()?, "Second");
        assert_eq!(blog.site_name()?, "Second");
        Ok(())
    })?;
    sandbox.run_test("live again", |sb| {
        assert_eq!(Blog::new(&*sb).site_name()?, "Sandbox Blog");
        Ok(())
    })?;
    Ok(())
}
