//! Feed import through the HTTP interceptor

use anyhow::Result;
use mockito::Server;
use sandbox_lib::mocks::RequestDisposition;
use sandbox_lib::{HttpResponse, SandboxError, UnmockedRequestError};
use sandbox_tests::{Blog, sqlite_sandbox};
use serde_json::json;

#[test]
fn test_feed_import_uses_mocked_response() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("imports feed", |sb| {
        sb.mock_http("https://feeds.example.com/*")?
            .and_respond(HttpResponse::json(&json!([
                {"title": "One", "body": "1"},
                {"title": "Two"}
            ])))
            .once();

        let ids = Blog::new(&*sb).import_feed("https://feeds.example.com/news.json")?;
        assert_eq!(ids.len(), 2);

        let requests = sb.registry().requests_to("https://feeds.example.com/news.json")?;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].disposition, RequestDisposition::Mocked);
        assert_eq!(requests[0].request.headers["accept"], "application/json");
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_unmocked_request_fails_the_test() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    let err = sandbox
        .run_test("leaks to the network", |sb| {
            Blog::new(&*sb).import_feed("https://feeds.example.com/news.json")?;
            Ok(())
        })
        .unwrap_err();

    let SandboxError::TestFailed { source, .. } = err else {
        panic!("expected the test body to fail");
    };
    let unmocked = source
        .downcast_ref::<UnmockedRequestError>()
        .expect("blocked request error");
    assert_eq!(unmocked.url, "https://feeds.example.com/news.json");
    Ok(())
}

#[test]
fn test_error_status_reaches_host_error_handling() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("feed down", |sb| {
        sb.mock_http("https://feeds.example.com/*")?
            .and_respond(HttpResponse::new(503, "maintenance"));

        let err = Blog::new(&*sb)
            .import_feed("https://feeds.example.com/news.json")
            .unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(Blog::new(&*sb).count()?, 0);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_allow_unmatched_reaches_real_server() -> Result<()> {
    let mut server = Server::new();
    let feed = server
        .mock("GET", "/feed.json")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"title": "From the wire", "body": ""}]"#)
        .expect(1)
        .create();
    let url = format!("{}/feed.json", server.url());

    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("live feed", |sb| {
        sb.registry().allow_unmatched();
        let ids = Blog::new(&*sb).import_feed(&url)?;
        assert_eq!(ids.len(), 1);

        let recorded = sb.registry().requests();
        assert_eq!(recorded[0].disposition, RequestDisposition::PassedThrough);
        assert_eq!(recorded[0].status, Some(200));
        Ok(())
    })?;

    feed.assert();
    assert!(sandbox.registry().is_blocking_unmatched());
    Ok(())
}

#[test]
fn test_sequence_of_responses_across_retries() -> Result<()> {
    let mut sandbox = sqlite_sandbox()?;
    sandbox.run_test("retries", |sb| {
        sb.mock_http("https://feeds.example.com/news.json")?
            .and_respond_sequence([
                HttpResponse::new(502, "bad gateway"),
                HttpResponse::json(&json!([{"title": "Eventually"}])),
            ])
            .twice();

        let blog = Blog::new(&*sb);
        assert!(blog.import_feed("https://feeds.example.com/news.json").is_err());
        assert_eq!(blog.import_feed("https://feeds.example.com/news.json")?.len(), 1);
        Ok(())
    })?;
    Ok(())
}
