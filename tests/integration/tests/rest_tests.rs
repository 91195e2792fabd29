//! REST integration tests
//!
//! Exercise the router over reqwest against the mock REST server.
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::Duration;

use anyhow::Result;
use cord_common::RestConfig;
use cord_rest::{catalog, DiscordRequest, EmptyIfNotFound, RestError, Router, RouteMatcher};
use integration_tests::{MockResponse, MockRestServer};
use serde_json::json;

const TOKEN: &str = "integration-token";

fn router_for(server: &MockRestServer) -> Result<Router> {
    let config = RestConfig {
        base_url: server.base_url(),
        ..RestConfig::default()
    };
    Ok(Router::from_config(&config, TOKEN)?)
}

// ============================================================================
// Request Tests
// ============================================================================

#[tokio::test]
async fn test_request_carries_auth_and_body() -> Result<()> {
    let server = MockRestServer::start().await?;
    server.script(
        "/channels/42/messages",
        MockResponse::ok_json(json!({"id": "1000", "content": "hello"})),
    );
    let router = router_for(&server)?;

    let response = router
        .execute(
            DiscordRequest::new(catalog::CREATE_MESSAGE)
                .param(42)
                .json(&json!({"content": "hello"}))?
                .reason("greeting"),
        )
        .await?;
    let message: serde_json::Value = response
        .json()?
        .ok_or_else(|| anyhow::anyhow!("empty body"))?;
    assert_eq!(message["id"], "1000");

    let requests = server.requests_to("/channels/42/messages");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.headers["authorization"], "Bot integration-token");
    assert!(request.headers["user-agent"]
        .to_str()?
        .starts_with("DiscordBot ("));
    assert_eq!(request.headers["content-type"], "application/json");
    assert_eq!(request.headers["x-audit-log-reason"], "greeting");
    assert_eq!(request.body, r#"{"content":"hello"}"#);
    Ok(())
}

#[tokio::test]
async fn test_query_parameters() -> Result<()> {
    let server = MockRestServer::start().await?;
    server.script("/channels/7/messages", MockResponse::ok_json(json!([])));
    let router = router_for(&server)?;

    router
        .execute(
            DiscordRequest::new(catalog::GET_MESSAGES)
                .param(7)
                .query("limit", 50)
                .query("before", 123),
        )
        .await?;

    let requests = server.requests_to("/channels/7/messages");
    assert_eq!(requests[0].query.as_deref(), Some("limit=50&before=123"));
    Ok(())
}

// ============================================================================
// Rate Limit Tests
// ============================================================================

#[tokio::test]
async fn test_exhausted_bucket_waits_for_reset() -> Result<()> {
    let server = MockRestServer::start().await?;
    server.script(
        "/channels/123/messages",
        MockResponse::ok_json(json!({}))
            .header("x-ratelimit-limit", "5")
            .header("x-ratelimit-remaining", "0")
            .header("x-ratelimit-reset-after", "1")
            .header("x-ratelimit-bucket", "messages-hash"),
    );
    let router = router_for(&server)?;
    let post = |channel: u64| DiscordRequest::new(catalog::CREATE_MESSAGE).param(channel);

    router.execute(post(123)).await?;
    let (same, other) = tokio::join!(router.execute(post(123)), router.execute(post(456)));
    same?;
    other?;

    let first_bucket = server.requests_to("/channels/123/messages");
    let other_bucket = server.requests_to("/channels/456/messages");
    let waited = first_bucket[1].received_at - first_bucket[0].received_at;
    assert!(waited >= Duration::from_millis(950), "waited {waited:?}");
    let other_delay = other_bucket[0].received_at - first_bucket[0].received_at;
    assert!(other_delay < Duration::from_millis(500), "other bucket waited {other_delay:?}");
    Ok(())
}

#[tokio::test]
async fn test_429_is_retried() -> Result<()> {
    let server = MockRestServer::start().await?;
    server.script("/channels/9", MockResponse::rate_limited(0.5));
    server.script("/channels/9", MockResponse::ok_json(json!({"id": "9"})));
    let router = router_for(&server)?;

    let response = router
        .execute(DiscordRequest::new(catalog::GET_CHANNEL).param(9))
        .await?;
    assert_eq!(response.status(), 200);

    let requests = server.requests_to("/channels/9");
    assert_eq!(requests.len(), 2);
    assert!(requests[1].received_at - requests[0].received_at >= Duration::from_millis(450));
    Ok(())
}

// ============================================================================
// Error Tests
// ============================================================================

#[tokio::test]
async fn test_not_found_transformed_only_where_configured() -> Result<()> {
    let server = MockRestServer::start().await?;
    server.script("/guilds/1/members/2", MockResponse::status(404));
    server.script("/channels/3", MockResponse::status(404));
    let router = router_for(&server)?.with_transformer(EmptyIfNotFound::new(
        RouteMatcher::routes([catalog::GET_GUILD_MEMBER]),
    ));

    let member = router
        .execute(DiscordRequest::new(catalog::GET_GUILD_MEMBER).params([1, 2]))
        .await?;
    assert!(member.is_empty());

    let err = router
        .execute(DiscordRequest::new(catalog::GET_CHANNEL).param(3))
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::Status { status: 404, .. }));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() -> Result<()> {
    let config = RestConfig {
        // Nothing listens on the discard port
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
        ..RestConfig::default()
    };
    let router = Router::from_config(&config, TOKEN)?;
    let err = router
        .execute(DiscordRequest::new(catalog::GET_CURRENT_USER))
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::Transport(_)));
    Ok(())
}
