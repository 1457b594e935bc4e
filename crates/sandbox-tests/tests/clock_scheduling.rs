//! Scheduled publishing under a frozen clock

use anyhow::Result;
use chrono::{TimeDelta, TimeZone, Utc};
use sandbox_lib::HostServices;
use sandbox_tests::{Blog, sqlite_sandbox};
use serde_json::json;

#[test]
fn test_freeze_then_advance_one_hour() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("frozen clock", |sb| {
        sb.time().freeze_at_str("2024-01-15 10:30:00")?;
        let start = sb.clock().timestamp();

        sb.time().advance(TimeDelta::hours(1))?;
        assert_eq!(sb.clock().timestamp() - start, 3600);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_posts_publish_once_their_time_comes() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("scheduled publishing", |sb| {
        sb.time().freeze_at_str("2024-01-15 10:30:00")?;
        let published = sb.mock_hook("post_published");
        published.once();

        let blog = Blog::new(&*sb);
        let id = blog.create_post("Launch", "")?;
        let post = blog.post(id)?.expect("post exists");
        assert_eq!(post.created_at, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());

        blog.schedule(id, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap())?;
        assert!(blog.publish_due()?.is_empty());

        sb.time().advance(TimeDelta::minutes(90))?;
        assert_eq!(blog.publish_due()?, vec![id]);
        assert!(blog.post(id)?.expect("post exists").published);
        assert!(published.was_called_with(&[json!(id)]));
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_clock_returns_to_live_time_after_the_test() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("frozen in the past", |sb| {
        sb.time().freeze_at_str("2001-01-01 00:00:00")?;
        assert!(sb.time().is_before(Utc.with_ymd_and_hms(2002, 1, 1, 0, 0, 0).unwrap()));
        Ok(())
    })?;

    assert!(!sandbox.time().is_frozen());
    assert!(sandbox.clock().now() > Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    Ok(())
}

#[test]
fn test_clock_read_expectations() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    let result = sandbox.run_test("reads the clock too often", |sb| {
        sb.time().freeze_now().at_most(1);
        let blog = Blog::new(&*sb);
        blog.create_post("One", "")?;
        blog.create_post("Two", "")?;
        Ok(())
    });

    let err = result.unwrap_err();
    assert!(err.to_string().contains("$clock"));
    Ok(())
}
