//! 会话生命周期 Hook 模块
//!
//! - 提供统一的会话状态容器、事件与阶段执行结果定义
//! - 以具名阶段显式排序（而非数值优先级），依赖关系在注册时校验

mod registry;
mod runtime;
mod types;

pub use registry::HookPipeline;
pub use runtime::HookDispatcher;
pub use types::{
    C2sState, Dispatch, HookFlow, HookKind, Placement, SessionCast, SessionHook, SessionInfo,
};
