//! 推送保活依赖的外部协作方接口
//!
//! 流管理层、消息分类、定时器原语、推送投递与推送会话注册表都由外部实现，
//! 本模块只定义它们暴露给保活逻辑的最小能力。

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::model::{
    MessageType, PushSession, ResponseSink, Stanza, StanzaKind, TimerRef, WakeTarget,
};
use crate::error::Result;

/// 流管理层对单个连接暴露的能力
pub trait StreamResumption: Send {
    /// 当前恢复超时
    fn resume_timeout(&self) -> Duration;

    /// 替换恢复超时
    fn set_resume_timeout(&mut self, timeout: Duration);

    /// 尚未投递的缓冲消息
    fn queued(&self) -> &[Stanza];

    /// 挂起期间缓冲一条消息
    fn enqueue(&mut self, stanza: Stanza);

    /// 取走全部缓冲消息（恢复后重放）
    fn drain_queued(&mut self) -> Vec<Stanza>;

    /// 返回第一条满足条件的缓冲消息
    fn find_queued(&self, predicate: &dyn Fn(&Stanza) -> bool) -> Option<&Stanza> {
        self.queued().iter().find(|stanza| predicate(stanza))
    }
}

/// 消息分类规则
pub trait MessageClassifier: Send + Sync {
    fn is_incoming_chat_message(&self, stanza: &Stanza) -> bool;
}

/// 默认分类：带正文或加密载荷的单聊/普通消息
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatMessageClassifier;

impl MessageClassifier for ChatMessageClassifier {
    fn is_incoming_chat_message(&self, stanza: &Stanza) -> bool {
        match stanza.kind {
            StanzaKind::Message(MessageType::Chat | MessageType::Normal) => {
                stanza.encrypted || stanza.body.as_deref().is_some_and(|b| !b.is_empty())
            }
            _ => false,
        }
    }
}

/// 会话级一次性定时器原语
///
/// 触发事件会回投到所属会话的串行事件流中，而不是直接跨线程调用。
pub trait WakeScheduler: Send + Sync {
    /// 在 `delay` 之后投递唤醒事件
    fn schedule(&self, delay: Duration) -> TimerRef;

    /// 尽力取消；与触发竞争时由句柄比对兜底
    fn cancel(&self, timer: &TimerRef);

    /// 会话销毁时取消全部定时器
    fn cancel_all(&self);
}

/// 推送投递
pub trait PushNotifier: Send + Sync {
    /// 非阻塞，投递结果通过 `response` 异步回传
    fn notify(&self, target: WakeTarget, response: ResponseSink);
}

/// 推送会话注册表（只读查询）
#[async_trait]
pub trait PushSessionRegistry: Send + Sync {
    async fn lookup_sessions(&self, domain: &str) -> Result<Vec<PushSession>>;
}
