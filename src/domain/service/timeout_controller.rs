//! 会话恢复超时控制
//!
//! 推送会话进入挂起时用配置的恢复超时覆盖流管理层的超时，并在超时前调度唤醒；
//! 会话恢复、收到聊天消息时还原原始超时并取消唤醒定时器。
//!
//! 所有操作均按“取得状态、修改、返回”的方式处理，调用方必须在同一会话的
//! 串行事件流中依次调用。

use std::sync::Arc;

use tracing::debug;

use crate::config::HostOptions;
use crate::domain::model::{SessionState, Stanza, TimerRef};
use crate::domain::repository::{MessageClassifier, StreamResumption, WakeScheduler};
use crate::domain::service::wake_timer::{WakeOutcome, WakeTimerManager, wake_delay};
use crate::metrics::KeepaliveMetrics;

pub struct SessionTimeoutController {
    classifier: Arc<dyn MessageClassifier>,
    wake: WakeTimerManager,
    options: Arc<HostOptions>,
    metrics: Arc<KeepaliveMetrics>,
}

impl SessionTimeoutController {
    pub fn new(
        classifier: Arc<dyn MessageClassifier>,
        wake: WakeTimerManager,
        options: Arc<HostOptions>,
        metrics: Arc<KeepaliveMetrics>,
    ) -> Self {
        Self {
            classifier,
            wake,
            options,
            metrics,
        }
    }

    /// 会话由在线转入挂起
    pub fn on_session_pending(
        &self,
        mut state: SessionState,
        stream: &mut dyn StreamResumption,
        timers: &dyn WakeScheduler,
    ) -> SessionState {
        if !state.push_enabled {
            return state;
        }

        let classifier = &self.classifier;
        if stream
            .find_queued(&|stanza: &Stanza| classifier.is_incoming_chat_message(stanza))
            .is_some()
        {
            // 缓冲区已有聊天消息，推送已经发出，客户端会按常规流程恢复
            debug!(owner = %state.owner, "Pending session has queued chat message, keeping resume timeout");
            return state;
        }

        if let Some(timeout) = state.resume_timeout {
            // 覆盖已生效时不再重复保存，避免把覆盖值当成原始值
            if state.resume_timeout_orig.is_none() {
                let original = stream.resume_timeout();
                stream.set_resume_timeout(timeout);
                state.resume_timeout_orig = Some(original);
                self.metrics.overrides_applied.inc();
                debug!(
                    owner = %state.owner,
                    original_secs = original.as_secs(),
                    resume_timeout_secs = timeout.as_secs(),
                    "Overriding resume timeout of push session"
                );
            }
        }

        if state.wake_on_timeout {
            if let Some(delay) = wake_delay(stream.resume_timeout()) {
                state = self.wake.schedule(state, timers, delay);
            }
        }

        state
    }

    /// 挂起会话重新连上
    pub fn on_session_resumed(
        &self,
        state: SessionState,
        stream: &mut dyn StreamResumption,
        timers: &dyn WakeScheduler,
    ) -> SessionState {
        if !state.push_enabled {
            return state;
        }
        self.restore_resume_timeout(state, stream, timers)
    }

    /// 挂起期间有消息投递到会话
    pub fn on_incoming_message(
        &self,
        state: SessionState,
        stanza: &Stanza,
        stream: &mut dyn StreamResumption,
        timers: &dyn WakeScheduler,
    ) -> SessionState {
        if !state.push_enabled || !state.is_pending() {
            return state;
        }
        if !self.classifier.is_incoming_chat_message(stanza) {
            return state;
        }
        self.restore_resume_timeout(state, stream, timers)
    }

    /// 客户端开启推送
    pub fn on_push_enabled(&self, mut state: SessionState, server_domain: &str) -> SessionState {
        let options = self.options.get(server_domain).unwrap_or_default();
        state.push_enabled = true;
        state.resume_timeout = options.resume_timeout;
        state.wake_on_timeout = options.wake_on_timeout;
        state
    }

    /// 客户端关闭推送
    ///
    /// 不会撤销已生效的覆盖和唤醒定时器。
    pub fn on_push_disabled(&self, mut state: SessionState) -> SessionState {
        state.push_enabled = false;
        state.resume_timeout = None;
        state.wake_on_timeout = false;
        state
    }

    /// 会话迁移到新的处理实例
    pub fn on_session_copy(&self, mut new_state: SessionState, old_state: &SessionState) -> SessionState {
        if !old_state.push_enabled {
            return new_state;
        }
        new_state.resume_timeout = old_state.resume_timeout;
        new_state.wake_on_timeout = old_state.wake_on_timeout;
        if let Some(original) = old_state.resume_timeout_orig {
            new_state.resume_timeout_orig = Some(original);
        }
        new_state
    }

    /// 唤醒定时器触发
    pub fn on_timer_fired(&self, state: SessionState, fired: &TimerRef) -> (SessionState, WakeOutcome) {
        self.wake.on_timer_fired(state, fired)
    }

    /// 服务域停用后释放会话残留的覆盖与唤醒定时器
    pub fn release(
        &self,
        state: SessionState,
        stream: &mut dyn StreamResumption,
        timers: &dyn WakeScheduler,
    ) -> SessionState {
        debug!(
            owner = %state.owner,
            domain = %state.domain,
            "Releasing keepalive state of stopped domain"
        );
        self.restore_resume_timeout(state, stream, timers)
    }

    fn restore_resume_timeout(
        &self,
        mut state: SessionState,
        stream: &mut dyn StreamResumption,
        timers: &dyn WakeScheduler,
    ) -> SessionState {
        if let Some(original) = state.resume_timeout_orig.take() {
            stream.set_resume_timeout(original);
            self.metrics.overrides_restored.inc();
            debug!(
                owner = %state.owner,
                resume_timeout_secs = original.as_secs(),
                "Restoring resume timeout of push session"
            );
        }
        self.wake.cancel(state, timers)
    }
}
