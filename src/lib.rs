//! Flare 推送保活模块
//!
//! 推送会话断线挂起时延长恢复超时，在超时前发送唤醒推送，
//! 启动时可批量唤醒所有已注册的推送客户端。

pub mod config;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod module;
pub mod runtime;
pub mod tracing;

pub use config::{
    ConfigManager, DEFAULT_RESUME_TIMEOUT, HostOptions, KeepaliveAppConfig, KeepaliveOptions,
    LoggingConfig, load_config, load_config_from_source, parse_config,
};
pub use domain::model::{
    MessageType, MgmtState, NotifyOutcome, PushSession, ResponseSink, SessionState, Stanza,
    StanzaKind, TimerRef, WakeTarget,
};
pub use domain::repository::{
    ChatMessageClassifier, MessageClassifier, PushNotifier, PushSessionRegistry,
    StreamResumption, WakeScheduler,
};
pub use domain::service::{
    BulkWaker, PUSH_BEFORE_TIMEOUT_PERIOD, SessionTimeoutController, WakeOutcome,
    WakeTimerManager, wake_delay,
};
pub use error::*;
pub use hooks::*;
pub use metrics::{KeepaliveMetrics, REGISTRY};
pub use module::{PUSH_KEEPALIVE_STAGE, PushKeepaliveModule};
pub use runtime::{
    SessionActor, SessionEvent, SessionExit, SessionHandle, SessionSnapshot, StreamMgmtStage,
    StreamMgmtState, TokioWakeScheduler,
};
