//! 会话运行时
//!
//! - 每个会话一个串行处理实例（邮箱 + tokio 任务）
//! - 投递回会话邮箱的定时器
//! - 保活所依赖的基础流管理与推送阶段

mod actor;
mod push;
mod scheduler;
mod stream_mgmt;

pub use actor::{
    MAILBOX_CAPACITY, SessionActor, SessionEvent, SessionExit, SessionHandle, SessionSnapshot,
};
pub use push::{PUSH_STAGE, PushStage};
pub use scheduler::TokioWakeScheduler;
pub use stream_mgmt::{
    DEFAULT_STREAM_RESUME_TIMEOUT, STREAM_MGMT_STAGE, StreamMgmtStage, StreamMgmtState,
};
