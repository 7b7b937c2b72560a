use std::fmt;
use std::sync::Arc;

use crate::domain::model::{SessionState, Stanza, TimerRef};
use crate::domain::repository::{StreamResumption, WakeScheduler};

/// 会话生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    SessionPending,
    SessionResumed,
    SessionCopy,
    StanzaRouted,
    HandleCast,
    HandleInfo,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::SessionPending => "session_pending",
            HookKind::SessionResumed => "session_resumed",
            HookKind::SessionCopy => "session_copy",
            HookKind::StanzaRouted => "stanza_routed",
            HookKind::HandleCast => "handle_cast",
            HookKind::HandleInfo => "handle_info",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个阶段的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookFlow {
    /// 交给下一个阶段
    #[default]
    Continue,
    /// 结束本次事件的管线；对 `handle_info` 表示要求终止会话
    Stop,
}

/// 一次事件在管线中的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// 所有阶段都已执行
    Completed,
    /// 被指定阶段提前结束
    StoppedBy(String),
}

impl Dispatch {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Dispatch::StoppedBy(_))
    }
}

/// 阶段注册位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// 追加到末尾
    Last,
    /// 紧跟在指定阶段之后
    After(String),
    /// 紧挨在指定阶段之前
    Before(String),
}

impl Placement {
    pub fn after<S: Into<String>>(stage: S) -> Self {
        Placement::After(stage.into())
    }

    pub fn before<S: Into<String>>(stage: S) -> Self {
        Placement::Before(stage.into())
    }
}

/// 投递给会话处理实例的内部请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCast {
    /// 客户端开启推送（携带服务域）
    PushEnable { server_domain: String },
    /// 客户端关闭推送
    PushDisable,
}

/// 投递给会话处理实例的带外消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInfo {
    /// 唤醒定时器触发
    WakeTimer(TimerRef),
}

/// 单个连接的会话状态容器
pub struct C2sState {
    pub session: SessionState,
    pub stream: Box<dyn StreamResumption>,
    pub timers: Arc<dyn WakeScheduler>,
}

impl C2sState {
    pub fn new(
        session: SessionState,
        stream: Box<dyn StreamResumption>,
        timers: Arc<dyn WakeScheduler>,
    ) -> Self {
        Self {
            session,
            stream,
            timers,
        }
    }
}

impl fmt::Debug for C2sState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("C2sState")
            .field("session", &self.session)
            .field("resume_timeout", &self.stream.resume_timeout())
            .field("queued", &self.stream.queued().len())
            .finish()
    }
}

/// 会话生命周期阶段
///
/// 所有方法默认直接放行。阶段在所属会话的事件循环中同步执行，不得阻塞。
pub trait SessionHook: Send + Sync {
    fn session_pending(&self, _c2s: &mut C2sState) -> HookFlow {
        HookFlow::Continue
    }

    fn session_resumed(&self, _c2s: &mut C2sState) -> HookFlow {
        HookFlow::Continue
    }

    fn session_copy(&self, _c2s: &mut C2sState, _old: &C2sState) -> HookFlow {
        HookFlow::Continue
    }

    fn stanza_routed(&self, _c2s: &mut C2sState, _stanza: &Stanza) -> HookFlow {
        HookFlow::Continue
    }

    fn handle_cast(&self, _c2s: &mut C2sState, _cast: &SessionCast) -> HookFlow {
        HookFlow::Continue
    }

    fn handle_info(&self, _c2s: &mut C2sState, _info: &SessionInfo) -> HookFlow {
        HookFlow::Continue
    }
}
