use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{KeepaliveError, Result};

use super::types::{Placement, SessionHook};

#[derive(Clone)]
pub(crate) struct StageEntry {
    pub(crate) name: String,
    pub(crate) handler: Arc<dyn SessionHook>,
}

/// 会话生命周期阶段管线
///
/// 阶段按注册时指定的位置显式排序，所有生命周期事件共用同一顺序。
/// 执行前先取快照，执行期间的注册与注销只影响之后的事件。
#[derive(Default)]
pub struct HookPipeline {
    stages: RwLock<Vec<StageEntry>>,
}

impl HookPipeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register<S: Into<String>>(
        &self,
        name: S,
        handler: Arc<dyn SessionHook>,
        placement: Placement,
    ) -> Result<()> {
        let name = name.into();
        let mut guard = self.stages.write();

        if guard.iter().any(|entry| entry.name == name) {
            return Err(KeepaliveError::DuplicateStage(name));
        }

        let position = match &placement {
            Placement::Last => guard.len(),
            Placement::After(anchor) => position_of(&guard, anchor)? + 1,
            Placement::Before(anchor) => position_of(&guard, anchor)?,
        };

        debug!(stage = %name, position, placement = ?placement, "Registered session hook stage");
        guard.insert(position, StageEntry { name, handler });
        Ok(())
    }

    /// 注销阶段，返回是否存在
    pub fn unregister(&self, name: &str) -> bool {
        let mut guard = self.stages.write();
        let before = guard.len();
        guard.retain(|entry| entry.name != name);
        let removed = guard.len() != before;
        if removed {
            debug!(stage = %name, "Unregistered session hook stage");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.read().iter().any(|entry| entry.name == name)
    }

    /// 当前执行顺序
    pub fn stage_names(&self) -> Vec<String> {
        self.stages
            .read()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<StageEntry> {
        self.stages.read().clone()
    }
}

fn position_of(stages: &[StageEntry], anchor: &str) -> Result<usize> {
    stages
        .iter()
        .position(|entry| entry.name == anchor)
        .ok_or_else(|| KeepaliveError::UnknownStage(anchor.to_string()))
}
