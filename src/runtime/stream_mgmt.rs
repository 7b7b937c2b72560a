//! 基础流管理阶段
//!
//! 维护连接的在线/挂起状态、恢复超时与挂起期间的消息缓冲。
//! 推送保活依赖本阶段先行更新这些字段。

use std::time::Duration;

use tracing::debug;

use crate::domain::model::{MgmtState, Stanza};
use crate::domain::repository::StreamResumption;
use crate::hooks::{C2sState, HookFlow, SessionHook};

/// 阶段名
pub const STREAM_MGMT_STAGE: &str = "stream_mgmt";

/// 流管理层默认恢复超时
pub const DEFAULT_STREAM_RESUME_TIMEOUT: Duration = Duration::from_secs(300);

/// 单个连接的流管理状态
#[derive(Debug, Clone)]
pub struct StreamMgmtState {
    resume_timeout: Duration,
    queue: Vec<Stanza>,
}

impl StreamMgmtState {
    pub fn new(resume_timeout: Duration) -> Self {
        Self {
            resume_timeout,
            queue: Vec::new(),
        }
    }
}

impl Default for StreamMgmtState {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_RESUME_TIMEOUT)
    }
}

impl StreamResumption for StreamMgmtState {
    fn resume_timeout(&self) -> Duration {
        self.resume_timeout
    }

    fn set_resume_timeout(&mut self, timeout: Duration) {
        self.resume_timeout = timeout;
    }

    fn queued(&self) -> &[Stanza] {
        &self.queue
    }

    fn enqueue(&mut self, stanza: Stanza) {
        self.queue.push(stanza);
    }

    fn drain_queued(&mut self) -> Vec<Stanza> {
        std::mem::take(&mut self.queue)
    }
}

#[derive(Debug, Default)]
pub struct StreamMgmtStage;

impl SessionHook for StreamMgmtStage {
    fn session_pending(&self, c2s: &mut C2sState) -> HookFlow {
        c2s.session.mgmt_state = MgmtState::Pending;
        debug!(
            owner = %c2s.session.owner,
            resume_timeout_secs = c2s.stream.resume_timeout().as_secs(),
            "Session is pending resumption"
        );
        HookFlow::Continue
    }

    fn session_resumed(&self, c2s: &mut C2sState) -> HookFlow {
        c2s.session.mgmt_state = MgmtState::Active;
        let replayed = c2s.stream.drain_queued();
        debug!(owner = %c2s.session.owner, replayed = replayed.len(), "Session resumed");
        HookFlow::Continue
    }

    fn session_copy(&self, c2s: &mut C2sState, old: &C2sState) -> HookFlow {
        c2s.stream.set_resume_timeout(old.stream.resume_timeout());
        for stanza in old.stream.queued() {
            c2s.stream.enqueue(stanza.clone());
        }
        c2s.session.mgmt_state = old.session.mgmt_state;
        HookFlow::Continue
    }

    fn stanza_routed(&self, c2s: &mut C2sState, stanza: &Stanza) -> HookFlow {
        if c2s.session.is_pending() {
            c2s.stream.enqueue(stanza.clone());
        }
        HookFlow::Continue
    }
}
