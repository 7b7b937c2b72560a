use std::sync::Arc;

use tracing::trace;

use crate::domain::model::Stanza;

use super::registry::{HookPipeline, StageEntry};
use super::types::{C2sState, Dispatch, HookFlow, HookKind, SessionCast, SessionInfo};

/// Hook 调度器，封装各生命周期事件的执行入口
#[derive(Clone)]
pub struct HookDispatcher {
    pipeline: Arc<HookPipeline>,
}

impl HookDispatcher {
    pub fn new(pipeline: Arc<HookPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn session_pending(&self, c2s: &mut C2sState) -> Dispatch {
        self.run(HookKind::SessionPending, |stage| stage.handler.session_pending(c2s))
    }

    pub fn session_resumed(&self, c2s: &mut C2sState) -> Dispatch {
        self.run(HookKind::SessionResumed, |stage| stage.handler.session_resumed(c2s))
    }

    pub fn session_copy(&self, c2s: &mut C2sState, old: &C2sState) -> Dispatch {
        self.run(HookKind::SessionCopy, |stage| stage.handler.session_copy(c2s, old))
    }

    pub fn stanza_routed(&self, c2s: &mut C2sState, stanza: &Stanza) -> Dispatch {
        self.run(HookKind::StanzaRouted, |stage| stage.handler.stanza_routed(c2s, stanza))
    }

    pub fn handle_cast(&self, c2s: &mut C2sState, cast: &SessionCast) -> Dispatch {
        self.run(HookKind::HandleCast, |stage| stage.handler.handle_cast(c2s, cast))
    }

    pub fn handle_info(&self, c2s: &mut C2sState, info: &SessionInfo) -> Dispatch {
        self.run(HookKind::HandleInfo, |stage| stage.handler.handle_info(c2s, info))
    }

    fn run<F>(&self, kind: HookKind, mut call: F) -> Dispatch
    where
        F: FnMut(&StageEntry) -> HookFlow,
    {
        for entry in self.pipeline.snapshot() {
            if call(&entry) == HookFlow::Stop {
                trace!(event = %kind, stage = %entry.name, "Session hook stopped the pipeline");
                return Dispatch::StoppedBy(entry.name);
            }
        }
        Dispatch::Completed
    }
}
