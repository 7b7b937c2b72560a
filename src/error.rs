//! 推送保活错误类型定义
//!
//! 保活控制器本身的事件处理不会失败，这里只覆盖模块生命周期、会话邮箱、
//! 指标注册与外部注册表查询。配置加载沿用 `anyhow`。

use thiserror::Error;

/// 推送保活错误类型
#[derive(Debug, Error)]
pub enum KeepaliveError {
    /// 依赖的 Hook 阶段未注册
    #[error("missing dependency stage: {0}")]
    MissingDependency(String),

    /// Hook 阶段定位锚点不存在
    #[error("unknown hook stage: {0}")]
    UnknownStage(String),

    /// Hook 阶段重复注册
    #[error("hook stage already registered: {0}")]
    DuplicateStage(String),

    /// 域未启动保活模块
    #[error("push keepalive not started for domain: {0}")]
    NotStarted(String),

    /// 域已启动保活模块
    #[error("push keepalive already started for domain: {0}")]
    AlreadyStarted(String),

    /// 推送会话注册表查询失败
    #[error("push session registry error: {0}")]
    Registry(String),

    /// 会话事件邮箱已关闭
    #[error("session mailbox closed: {0}")]
    MailboxClosed(String),

    /// 指标注册失败
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// 会话处理实例异常退出
    #[error("session task failed: {0}")]
    SessionTask(#[from] tokio::task::JoinError),
}

/// 推送保活结果类型
pub type Result<T> = std::result::Result<T, KeepaliveError>;
