//! 唤醒定时器管理
//!
//! 每个会话最多一个唤醒定时器。触发时只有句柄与当前记录一致、
//! 会话仍处于挂起且推送仍开启时才发送唤醒通知并要求终止会话。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::model::{ResponseSink, SessionState, TimerRef, WakeTarget};
use crate::domain::repository::{PushNotifier, WakeScheduler};
use crate::metrics::{KeepaliveMetrics, WAKE_PATH_TIMEOUT};

/// 在恢复超时到期前多久发送唤醒
pub const PUSH_BEFORE_TIMEOUT_PERIOD: Duration = Duration::from_secs(120);

/// 生效的恢复超时对应的唤醒延迟
///
/// 超时不大于保护期时返回 `None`，会话按流管理层原有超时自然过期。
pub fn wake_delay(effective_timeout: Duration) -> Option<Duration> {
    effective_timeout
        .checked_sub(PUSH_BEFORE_TIMEOUT_PERIOD)
        .filter(|delay| !delay.is_zero())
}

/// 定时器触发的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// 过期或不满足前置条件，忽略
    Ignored,
    /// 已发送唤醒通知，会话应立即终止
    Terminate,
}

pub struct WakeTimerManager {
    notifier: Arc<dyn PushNotifier>,
    metrics: Arc<KeepaliveMetrics>,
}

impl WakeTimerManager {
    pub fn new(notifier: Arc<dyn PushNotifier>, metrics: Arc<KeepaliveMetrics>) -> Self {
        Self { notifier, metrics }
    }

    /// 调度唤醒定时器，替换已有记录
    pub fn schedule(
        &self,
        mut state: SessionState,
        timers: &dyn WakeScheduler,
        delay: Duration,
    ) -> SessionState {
        if let Some(previous) = state.pending_wake_timer.take() {
            timers.cancel(&previous);
            self.metrics.wake_timers_cancelled.inc();
        }

        let timer = timers.schedule(delay);
        debug!(
            owner = %state.owner,
            timer = %timer,
            delay_ms = delay.as_millis() as u64,
            "Scheduled push keepalive wake timer"
        );
        state.pending_wake_timer = Some(timer);
        self.metrics.wake_timers_scheduled.inc();
        state
    }

    /// 取消唤醒定时器并清除记录
    pub fn cancel(&self, mut state: SessionState, timers: &dyn WakeScheduler) -> SessionState {
        if let Some(timer) = state.pending_wake_timer.take() {
            timers.cancel(&timer);
            self.metrics.wake_timers_cancelled.inc();
            debug!(owner = %state.owner, timer = %timer, "Cancelled push keepalive wake timer");
        }
        state
    }

    /// 处理定时器触发
    pub fn on_timer_fired(
        &self,
        mut state: SessionState,
        fired: &TimerRef,
    ) -> (SessionState, WakeOutcome) {
        if state.pending_wake_timer.as_ref() != Some(fired) {
            self.metrics.stale_timer_fires.inc();
            debug!(owner = %state.owner, timer = %fired, "Ignoring stale push keepalive timer");
            return (state, WakeOutcome::Ignored);
        }
        if !state.push_enabled || !state.is_pending() {
            debug!(
                owner = %state.owner,
                push_enabled = state.push_enabled,
                mgmt_state = ?state.mgmt_state,
                "Push keepalive timer fired outside a pending push session"
            );
            return (state, WakeOutcome::Ignored);
        }

        state.pending_wake_timer = None;
        info!(owner = %state.owner, "Waking session before it times out");
        self.notifier.notify(
            WakeTarget::Session {
                owner: state.owner.clone(),
            },
            ResponseSink::Ignore,
        );
        self.metrics.record_wake(WAKE_PATH_TIMEOUT);
        self.metrics.sessions_terminated.inc();
        (state, WakeOutcome::Terminate)
    }
}
