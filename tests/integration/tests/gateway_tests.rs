//! Gateway integration tests
//!
//! Drive a real shard over WebSocket against the mock gateway.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use anyhow::Result;
use cord_common::JitterMode;
use cord_gateway::protocol::OpCode;
use cord_gateway::retry::RetryOptions;
use cord_gateway::{GatewayEvent, GatewayStateChange, SessionState, Shard, ShardConfig};
use integration_tests::{wait_for_event, wait_for_state, MockGateway, MOCK_SESSION_ID};

const SLOW_HEARTBEAT: Duration = Duration::from_secs(45);

fn shard_for(gateway: &MockGateway) -> Result<Shard> {
    let retry = RetryOptions::builder()
        .first_backoff(Duration::from_secs(2))
        .max_backoff_interval(Duration::from_secs(4))
        .max_retries(3)
        .jitter(JitterMode::None)
        .build()?;
    let config = ShardConfig::builder("integration-token")
        .url(gateway.url())
        .retry(retry)
        .connect_timeout(Duration::from_secs(5))
        .build()?;
    Ok(Shard::new(config))
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_identify_and_ready() -> Result<()> {
    let gateway = MockGateway::start(SLOW_HEARTBEAT).await?;
    let shard = shard_for(&gateway)?;
    let mut events = shard.subscribe();

    shard.connect().await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;
    wait_for_event(&mut events, |e| {
        matches!(e, GatewayEvent::Dispatch(d) if d.name == "READY")
    })
    .await?;

    assert_eq!(shard.state(), SessionState::Connected);
    assert_eq!(shard.session_id().as_deref(), Some(MOCK_SESSION_ID));
    assert_eq!(shard.sequence(), Some(1));

    let identify = gateway
        .received()
        .into_iter()
        .find(|m| m.op == OpCode::Identify)
        .ok_or_else(|| anyhow::anyhow!("no IDENTIFY received"))?;
    assert_eq!(identify.d["token"], "integration-token");

    shard.shutdown(false).await?;
    Ok(())
}

#[tokio::test]
async fn test_heartbeats_are_acknowledged() -> Result<()> {
    let gateway = MockGateway::start(Duration::from_millis(200)).await?;
    let shard = shard_for(&gateway)?;
    let mut events = shard.subscribe();

    shard.connect().await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(gateway.count_op(OpCode::Heartbeat) >= 2);
    assert!(shard.latency().is_some());
    assert_eq!(shard.state(), SessionState::Connected);

    shard.shutdown(false).await?;
    Ok(())
}

// ============================================================================
// Reconnect Tests
// ============================================================================

#[tokio::test]
async fn test_normal_close_resumes_on_resume_url() -> Result<()> {
    let gateway = MockGateway::start(SLOW_HEARTBEAT).await?;
    let shard = shard_for(&gateway)?;
    let mut events = shard.subscribe();

    shard.connect().await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;

    gateway.close_all(1000);
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Disconnected).await?;
    let retry = wait_for_state(&mut events, |c| {
        matches!(c, GatewayStateChange::RetryResumeStarted { .. })
    })
    .await?;
    assert_eq!(retry.backoff(), Some(Duration::from_secs(2)));

    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;
    assert_eq!(gateway.count_op(OpCode::Resume), 1);
    assert_eq!(gateway.count_op(OpCode::Identify), 1);
    assert_eq!(shard.session_id().as_deref(), Some(MOCK_SESSION_ID));

    let paths = gateway.connection_paths();
    assert_eq!(paths.len(), 2);
    assert!(paths[1].starts_with("/resume"));

    shard.shutdown(false).await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_session_close_reidentifies() -> Result<()> {
    let gateway = MockGateway::start(SLOW_HEARTBEAT).await?;
    let shard = shard_for(&gateway)?;
    let mut events = shard.subscribe();

    shard.connect().await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;

    // Session timed out
    gateway.close_all(4009);
    wait_for_state(&mut events, |c| {
        matches!(c, GatewayStateChange::RetryStarted { .. })
    })
    .await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;

    assert_eq!(gateway.count_op(OpCode::Identify), 2);
    assert_eq!(gateway.count_op(OpCode::Resume), 0);

    shard.shutdown(false).await?;
    Ok(())
}

#[tokio::test]
async fn test_fatal_close_terminates() -> Result<()> {
    let gateway = MockGateway::start(SLOW_HEARTBEAT).await?;
    let shard = shard_for(&gateway)?;
    let mut events = shard.subscribe();

    shard.connect().await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;

    // Disallowed intents
    gateway.close_all(4014);
    let terminated =
        wait_for_event(&mut events, |e| matches!(e, GatewayEvent::Terminated(_))).await?;
    assert!(matches!(terminated, GatewayEvent::Terminated(Some(_))));
    assert_eq!(shard.state(), SessionState::Terminated);
    assert_eq!(gateway.connection_paths().len(), 1);
    Ok(())
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_shutdown_keeps_session_for_resume() -> Result<()> {
    let gateway = MockGateway::start(SLOW_HEARTBEAT).await?;
    let shard = shard_for(&gateway)?;
    let mut events = shard.subscribe();

    shard.connect().await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;

    shard.shutdown(true).await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::DisconnectedResume).await?;
    assert_eq!(shard.session_id().as_deref(), Some(MOCK_SESSION_ID));

    // Reconnecting picks the session back up
    shard.connect().await?;
    wait_for_state(&mut events, |c| *c == GatewayStateChange::Connected).await?;
    assert_eq!(gateway.count_op(OpCode::Resume), 1);

    shard.shutdown(false).await?;
    Ok(())
}
