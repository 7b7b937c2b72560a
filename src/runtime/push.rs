//! 基础推送阶段：会话迁移时携带推送开关

use crate::hooks::{C2sState, HookFlow, SessionHook};

/// 阶段名
pub const PUSH_STAGE: &str = "push";

#[derive(Debug, Default)]
pub struct PushStage;

impl SessionHook for PushStage {
    fn session_copy(&self, c2s: &mut C2sState, old: &C2sState) -> HookFlow {
        c2s.session.push_enabled = old.session.push_enabled;
        HookFlow::Continue
    }
}
