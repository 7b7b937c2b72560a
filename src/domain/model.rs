//! 推送保活领域模型
//!
//! - 会话保活状态（每个连接独占一份）
//! - 定时器句柄、消息节（stanza）与推送会话注册项

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 流管理（可恢复会话）层对连接的判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MgmtState {
    /// 连接在线
    #[default]
    Active,
    /// 连接已断开，处于可恢复窗口内
    Pending,
    /// 已协商流管理但尚未启用
    Bound,
}

/// 唤醒定时器句柄
///
/// 每次调度生成新的句柄，触发事件携带句柄用于与当前记录比对。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerRef(Uuid);

impl TimerRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push_keepalive:{}", self.0)
    }
}

/// 会话保活状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// 会话所属用户（完整地址）
    pub owner: String,
    /// 服务域
    pub domain: String,
    /// 是否已开启推送
    pub push_enabled: bool,
    /// 流管理状态
    pub mgmt_state: MgmtState,
    /// 推送会话在挂起期间使用的恢复超时，`None` 表示不覆盖
    pub resume_timeout: Option<Duration>,
    /// 是否在超时前调度唤醒
    pub wake_on_timeout: bool,
    /// 覆盖生效时保存的原始恢复超时
    pub resume_timeout_orig: Option<Duration>,
    /// 当前唯一的唤醒定时器
    pub pending_wake_timer: Option<TimerRef>,
}

impl SessionState {
    pub fn new<O: Into<String>, D: Into<String>>(owner: O, domain: D) -> Self {
        Self {
            owner: owner.into(),
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.mgmt_state == MgmtState::Pending
    }

    /// 覆盖是否仍在生效
    pub fn override_active(&self) -> bool {
        self.resume_timeout_orig.is_some()
    }
}

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Chat,
    Normal,
    Groupchat,
    Headline,
    Error,
}

/// 消息节类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StanzaKind {
    Message(MessageType),
    Presence,
    Iq,
}

/// 路由到会话的消息节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stanza {
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    pub kind: StanzaKind,
    #[serde(default)]
    pub body: Option<String>,
    /// 是否携带端到端加密载荷
    #[serde(default)]
    pub encrypted: bool,
}

impl Stanza {
    pub fn message<F: Into<String>, T: Into<String>>(from: F, to: T, ty: MessageType) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: to.into(),
            kind: StanzaKind::Message(ty),
            body: None,
            encrypted: false,
        }
    }

    pub fn chat<F: Into<String>, T: Into<String>, B: Into<String>>(from: F, to: T, body: B) -> Self {
        Self::message(from, to, MessageType::Chat).with_body(body)
    }

    pub fn presence<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: to.into(),
            kind: StanzaKind::Presence,
            body: None,
            encrypted: false,
        }
    }

    pub fn with_body<B: Into<String>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_encrypted_payload(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn with_id<I: Into<String>>(mut self, id: I) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// 推送会话注册项（离线推送注册表中的一条）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSession {
    /// 会话所属用户
    pub owner: String,
    /// 推送服务地址
    pub target: String,
    /// 推送节点标识
    pub node: String,
    /// 推送配置（发布选项）
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// 唤醒通知对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeTarget {
    /// 仍在挂起的会话，推送目标由推送子系统自行解析
    Session { owner: String },
    /// 注册表中记录的推送会话
    Registered(PushSession),
}

/// 推送投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    Failed(String),
}

/// 推送响应处理策略
pub enum ResponseSink {
    /// 发出即忘，不关心投递结果
    Ignore,
    /// 投递完成后回调
    Callback(Box<dyn FnOnce(NotifyOutcome) + Send>),
}

impl ResponseSink {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(NotifyOutcome) + Send + 'static,
    {
        ResponseSink::Callback(Box::new(f))
    }

    /// 投递方在拿到结果后调用
    pub fn complete(self, outcome: NotifyOutcome) {
        if let ResponseSink::Callback(f) = self {
            f(outcome);
        }
    }
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSink::Ignore => f.write_str("ResponseSink::Ignore"),
            ResponseSink::Callback(_) => f.write_str("ResponseSink::Callback(..)"),
        }
    }
}
