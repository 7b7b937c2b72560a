//! 基于 tokio 的会话定时器
//!
//! 每个定时器是一个独立的 sleep 任务，到期后把 `SessionInfo::WakeTimer` 投递回
//! 所属会话的邮箱。只持有邮箱的弱引用，不会阻止会话退出。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::WeakSender;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::domain::model::TimerRef;
use crate::domain::repository::WakeScheduler;
use crate::hooks::SessionInfo;

use super::actor::SessionEvent;

pub struct TokioWakeScheduler {
    mailbox: WeakSender<SessionEvent>,
    timers: Arc<DashMap<TimerRef, AbortHandle>>,
}

impl TokioWakeScheduler {
    pub fn new(mailbox: WeakSender<SessionEvent>) -> Self {
        Self {
            mailbox,
            timers: Arc::new(DashMap::new()),
        }
    }

    /// 尚未触发也未取消的定时器数量
    pub fn outstanding(&self) -> usize {
        self.timers.len()
    }
}

impl WakeScheduler for TokioWakeScheduler {
    fn schedule(&self, delay: Duration) -> TimerRef {
        let timer = TimerRef::new();
        let mailbox = self.mailbox.clone();
        let timers = Arc::clone(&self.timers);

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timers.remove(&timer);
            if let Some(sender) = mailbox.upgrade() {
                if sender
                    .send(SessionEvent::Info(SessionInfo::WakeTimer(timer)))
                    .await
                    .is_err()
                {
                    trace!(timer = %timer, "Session gone before timer delivery");
                }
            }
        });

        self.timers.insert(timer, task.abort_handle());
        timer
    }

    fn cancel(&self, timer: &TimerRef) {
        if let Some((_, handle)) = self.timers.remove(timer) {
            handle.abort();
        }
    }

    fn cancel_all(&self) {
        self.timers.retain(|_, handle| {
            handle.abort();
            false
        });
    }
}
