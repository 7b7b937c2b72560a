// 集成测试 - 在虚拟时钟上驱动会话处理实例，验证覆盖、唤醒与迁移
mod common;

use std::time::Duration;

use anyhow::Result;
use flare_push_keepalive::{
    MgmtState, PUSH_KEEPALIVE_STAGE, SessionActor, SessionExit, SessionState, Stanza,
    StreamMgmtState, StreamResumption, WakeTarget,
};
use tokio::time::Instant;

use common::{DOMAIN, Harness, OWNER, options};

fn new_session() -> SessionState {
    SessionState::new(OWNER, DOMAIN)
}

#[tokio::test(start_paused = true)]
async fn test_pending_push_session_is_woken_before_timeout() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push(DOMAIN).await?;
    handle.connection_lost().await?;

    let snapshot = handle.snapshot().await?;
    assert_eq!(snapshot.session.mgmt_state, MgmtState::Pending);
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(600));
    assert_eq!(
        snapshot.session.resume_timeout_orig,
        Some(Duration::from_secs(300))
    );
    assert!(snapshot.session.pending_wake_timer.is_some());

    let started = Instant::now();
    let exit = handle.wait().await?;
    let elapsed = started.elapsed();

    assert_eq!(
        exit,
        SessionExit::Terminated {
            reason: PUSH_KEEPALIVE_STAGE.to_string()
        }
    );
    // 600s 恢复超时减去 120s 保护期
    assert!(elapsed >= Duration::from_secs(480));
    assert!(elapsed < Duration::from_secs(600));
    assert_eq!(
        harness.notifier.targets(),
        vec![WakeTarget::Session {
            owner: OWNER.to_string()
        }]
    );
    assert_eq!(harness.metrics.sessions_terminated.get(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_incoming_chat_restores_timeout_and_cancels_wake() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push(DOMAIN).await?;
    handle.connection_lost().await?;
    handle
        .route(Stanza::chat("bob@example.com", "alice@example.com", "are you there?"))
        .await?;

    let snapshot = handle.snapshot().await?;
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(300));
    assert!(!snapshot.session.override_active());
    assert!(snapshot.session.pending_wake_timer.is_none());
    assert_eq!(snapshot.queued, 1);

    tokio::time::sleep(Duration::from_secs(900)).await;
    assert!(harness.notifier.targets().is_empty());

    handle.close().await?;
    assert_eq!(handle.wait().await?, SessionExit::Closed);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_non_chat_stanza_keeps_override() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push(DOMAIN).await?;
    handle.connection_lost().await?;
    handle
        .route(Stanza::presence("bob@example.com", "alice@example.com"))
        .await?;

    let snapshot = handle.snapshot().await?;
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(600));
    assert!(snapshot.session.pending_wake_timer.is_some());

    handle.close().await?;
    assert_eq!(handle.wait().await?, SessionExit::Closed);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_resume_on_same_session_restores_timeout() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push(DOMAIN).await?;
    handle.connection_lost().await?;
    handle.resumed().await?;

    let snapshot = handle.snapshot().await?;
    assert_eq!(snapshot.session.mgmt_state, MgmtState::Active);
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(300));
    assert!(snapshot.session.pending_wake_timer.is_none());

    tokio::time::sleep(Duration::from_secs(900)).await;
    assert!(harness.notifier.targets().is_empty());

    handle.close().await?;
    handle.wait().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_short_timeout_is_not_woken() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(120))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push(DOMAIN).await?;
    handle.connection_lost().await?;

    let snapshot = handle.snapshot().await?;
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(120));
    assert!(snapshot.session.pending_wake_timer.is_none());

    handle.close().await?;
    handle.wait().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_session_without_push_is_untouched() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.connection_lost().await?;

    let snapshot = handle.snapshot().await?;
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(300));
    assert!(!snapshot.session.push_enabled);
    assert!(snapshot.session.pending_wake_timer.is_none());

    handle.close().await?;
    handle.wait().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_domain_without_keepalive_is_untouched() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        SessionState::new("dave@other.org/laptop", "other.org"),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push("other.org").await?;
    handle.connection_lost().await?;

    let snapshot = handle.snapshot().await?;
    assert!(!snapshot.session.push_enabled);
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(300));

    handle.close().await?;
    handle.wait().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_handoff_to_new_session_carries_and_restores_state() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let old = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    old.enable_push(DOMAIN).await?;
    old.connection_lost().await?;
    old.route(Stanza::presence("bob@example.com", "alice@example.com"))
        .await?;

    let old_state = old.handoff().await?;
    assert_eq!(old.wait().await?, SessionExit::HandedOff);
    assert_eq!(old_state.stream.resume_timeout(), Duration::from_secs(600));

    let fresh = SessionActor::spawn_resumed(
        new_session(),
        Box::new(StreamMgmtState::default()),
        old_state,
        harness.dispatcher(),
    );

    let snapshot = fresh.snapshot().await?;
    assert!(snapshot.session.push_enabled);
    assert_eq!(snapshot.session.mgmt_state, MgmtState::Active);
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(300));
    assert!(!snapshot.session.override_active());
    assert_eq!(snapshot.session.resume_timeout, Some(Duration::from_secs(600)));
    assert_eq!(snapshot.queued, 0);

    // 旧实例的唤醒定时器已随交接取消
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert!(harness.notifier.targets().is_empty());

    // 新实例再次挂起时重新覆盖并调度
    fresh.connection_lost().await?;
    let snapshot = fresh.snapshot().await?;
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(600));
    assert!(snapshot.session.pending_wake_timer.is_some());

    fresh.close().await?;
    assert_eq!(fresh.wait().await?, SessionExit::Closed);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_disable_push_keeps_pending_override() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push(DOMAIN).await?;
    handle.connection_lost().await?;
    handle.disable_push().await?;

    let snapshot = handle.snapshot().await?;
    assert!(!snapshot.session.push_enabled);
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(600));
    assert!(snapshot.session.override_active());
    assert!(snapshot.session.pending_wake_timer.is_some());

    // 定时器仍会触发，但推送已关闭，不发送唤醒
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert!(harness.notifier.targets().is_empty());

    handle.close().await?;
    assert_eq!(handle.wait().await?, SessionExit::Closed);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stopped_domain_releases_pending_override() -> Result<()> {
    let harness = Harness::new();
    harness.module.start(DOMAIN, options(Duration::from_secs(600))).await?;
    harness.module.start("other.org", options(Duration::from_secs(600))).await?;

    let handle = SessionActor::spawn(
        new_session(),
        Box::new(StreamMgmtState::default()),
        harness.dispatcher(),
    );
    handle.enable_push(DOMAIN).await?;
    handle.connection_lost().await?;
    assert_eq!(handle.snapshot().await?.resume_timeout, Duration::from_secs(600));

    harness.module.stop(DOMAIN)?;
    handle
        .route(Stanza::presence("bob@example.com", "alice@example.com"))
        .await?;

    let snapshot = handle.snapshot().await?;
    assert_eq!(snapshot.resume_timeout, Duration::from_secs(300));
    assert!(!snapshot.session.override_active());
    assert!(snapshot.session.pending_wake_timer.is_none());

    tokio::time::sleep(Duration::from_secs(900)).await;
    assert!(harness.notifier.targets().is_empty());

    handle.close().await?;
    assert_eq!(handle.wait().await?, SessionExit::Closed);
    Ok(())
}
