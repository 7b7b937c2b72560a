//! 批量唤醒
//!
//! 启动时（或重新配置开启 `wake_on_start` 时）向域内所有已注册的推送会话发送唤醒通知。
//! 尽力而为：投递失败不重试，注册表查询失败按空结果处理。

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::model::{ResponseSink, WakeTarget};
use crate::domain::repository::{PushNotifier, PushSessionRegistry};
use crate::metrics::{KeepaliveMetrics, WAKE_PATH_BULK};

pub struct BulkWaker {
    registry: Arc<dyn PushSessionRegistry>,
    notifier: Arc<dyn PushNotifier>,
    metrics: Arc<KeepaliveMetrics>,
}

impl BulkWaker {
    pub fn new(
        registry: Arc<dyn PushSessionRegistry>,
        notifier: Arc<dyn PushNotifier>,
        metrics: Arc<KeepaliveMetrics>,
    ) -> Self {
        Self {
            registry,
            notifier,
            metrics,
        }
    }

    /// 唤醒域内全部推送会话，返回已发出的通知数
    ///
    /// 通知全部交给投递方后即返回，不等待投递结果。
    pub async fn wake_all(&self, domain: &str) -> usize {
        info!(domain = %domain, "Waking all push clients");

        let sessions = match self.registry.lookup_sessions(domain).await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(domain = %domain, error = %err, "Cannot lookup push sessions, skipping wake");
                return 0;
            }
        };

        let dispatched = sessions.len();
        for session in sessions {
            self.notifier
                .notify(WakeTarget::Registered(session), ResponseSink::Ignore);
            self.metrics.record_wake(WAKE_PATH_BULK);
        }

        info!(domain = %domain, dispatched, "Dispatched wake-up notifications");
        dispatched
    }
}
