//! 推送保活模块
//!
//! 把会话超时控制器接入会话生命周期管线，并按服务域管理启停与重新配置。

use std::sync::Arc;

use tracing::info;

use crate::config::{HostOptions, KeepaliveAppConfig, KeepaliveOptions};
use crate::domain::model::Stanza;
use crate::domain::repository::{MessageClassifier, PushNotifier, PushSessionRegistry};
use crate::domain::service::{BulkWaker, SessionTimeoutController, WakeOutcome, WakeTimerManager};
use crate::error::{KeepaliveError, Result};
use crate::hooks::{
    C2sState, HookFlow, HookPipeline, Placement, SessionCast, SessionHook, SessionInfo,
};
use crate::metrics::KeepaliveMetrics;
use crate::runtime::{PUSH_STAGE, STREAM_MGMT_STAGE};

/// 保活阶段名
pub const PUSH_KEEPALIVE_STAGE: &str = "push_keepalive";

/// 接入管线的保活阶段
///
/// 只处理已启动保活的服务域内的会话。服务域停用后，会话残留的覆盖
/// 在其下一个事件上被还原。
pub struct KeepaliveStage {
    controller: Arc<SessionTimeoutController>,
    options: Arc<HostOptions>,
}

impl KeepaliveStage {
    fn serves(&self, c2s: &mut C2sState) -> bool {
        if self.options.contains(&c2s.session.domain) {
            return true;
        }
        if c2s.session.override_active() || c2s.session.pending_wake_timer.is_some() {
            let state = std::mem::take(&mut c2s.session);
            c2s.session = self
                .controller
                .release(state, &mut *c2s.stream, &*c2s.timers);
        }
        false
    }
}

impl SessionHook for KeepaliveStage {
    fn session_pending(&self, c2s: &mut C2sState) -> HookFlow {
        if self.serves(c2s) {
            let state = std::mem::take(&mut c2s.session);
            c2s.session = self
                .controller
                .on_session_pending(state, &mut *c2s.stream, &*c2s.timers);
        }
        HookFlow::Continue
    }

    fn session_resumed(&self, c2s: &mut C2sState) -> HookFlow {
        if self.serves(c2s) {
            let state = std::mem::take(&mut c2s.session);
            c2s.session = self
                .controller
                .on_session_resumed(state, &mut *c2s.stream, &*c2s.timers);
        }
        HookFlow::Continue
    }

    fn session_copy(&self, c2s: &mut C2sState, old: &C2sState) -> HookFlow {
        if self.serves(c2s) {
            let state = std::mem::take(&mut c2s.session);
            c2s.session = self.controller.on_session_copy(state, &old.session);
        }
        HookFlow::Continue
    }

    fn stanza_routed(&self, c2s: &mut C2sState, stanza: &Stanza) -> HookFlow {
        if self.serves(c2s) {
            let state = std::mem::take(&mut c2s.session);
            c2s.session =
                self.controller
                    .on_incoming_message(state, stanza, &mut *c2s.stream, &*c2s.timers);
        }
        HookFlow::Continue
    }

    fn handle_cast(&self, c2s: &mut C2sState, cast: &SessionCast) -> HookFlow {
        if !self.serves(c2s) {
            return HookFlow::Continue;
        }
        let state = std::mem::take(&mut c2s.session);
        c2s.session = match cast {
            SessionCast::PushEnable { server_domain } => {
                self.controller.on_push_enabled(state, server_domain)
            }
            SessionCast::PushDisable => self.controller.on_push_disabled(state),
        };
        HookFlow::Continue
    }

    fn handle_info(&self, c2s: &mut C2sState, message: &SessionInfo) -> HookFlow {
        if !self.serves(c2s) {
            return HookFlow::Continue;
        }
        match message {
            SessionInfo::WakeTimer(timer) => {
                let state = std::mem::take(&mut c2s.session);
                let (state, outcome) = self.controller.on_timer_fired(state, timer);
                c2s.session = state;
                match outcome {
                    WakeOutcome::Terminate => HookFlow::Stop,
                    WakeOutcome::Ignored => HookFlow::Continue,
                }
            }
        }
    }
}

/// 推送保活模块
pub struct PushKeepaliveModule {
    pipeline: Arc<HookPipeline>,
    options: Arc<HostOptions>,
    controller: Arc<SessionTimeoutController>,
    bulk_waker: BulkWaker,
}

impl PushKeepaliveModule {
    pub fn new(
        pipeline: Arc<HookPipeline>,
        notifier: Arc<dyn PushNotifier>,
        registry: Arc<dyn PushSessionRegistry>,
        classifier: Arc<dyn MessageClassifier>,
        metrics: Arc<KeepaliveMetrics>,
    ) -> Self {
        let options = Arc::new(HostOptions::default());
        let wake = WakeTimerManager::new(Arc::clone(&notifier), Arc::clone(&metrics));
        let controller = Arc::new(SessionTimeoutController::new(
            classifier,
            wake,
            Arc::clone(&options),
            Arc::clone(&metrics),
        ));
        let bulk_waker = BulkWaker::new(registry, notifier, metrics);

        Self {
            pipeline,
            options,
            controller,
            bulk_waker,
        }
    }

    /// 在服务域上启动保活，返回启动唤醒发出的通知数
    pub async fn start(&self, domain: &str, options: KeepaliveOptions) -> Result<usize> {
        for dependency in [STREAM_MGMT_STAGE, PUSH_STAGE] {
            if !self.pipeline.contains(dependency) {
                return Err(KeepaliveError::MissingDependency(dependency.to_string()));
            }
        }
        if self.options.contains(domain) {
            return Err(KeepaliveError::AlreadyStarted(domain.to_string()));
        }

        if !self.pipeline.contains(PUSH_KEEPALIVE_STAGE) {
            let stage = KeepaliveStage {
                controller: Arc::clone(&self.controller),
                options: Arc::clone(&self.options),
            };
            self.pipeline.register(
                PUSH_KEEPALIVE_STAGE,
                Arc::new(stage),
                Placement::after(STREAM_MGMT_STAGE),
            )?;
        }
        self.options.insert(domain, options);

        info!(
            domain = %domain,
            resume_timeout_secs = options.resume_timeout.map(|t| t.as_secs()),
            wake_on_start = options.wake_on_start,
            wake_on_timeout = options.wake_on_timeout,
            "Push keepalive started"
        );

        if options.wake_on_start {
            Ok(self.bulk_waker.wake_all(domain).await)
        } else {
            Ok(0)
        }
    }

    /// 替换服务域的选项；`wake_on_start` 由关变开时执行一次批量唤醒
    pub async fn reload(&self, domain: &str, options: KeepaliveOptions) -> Result<usize> {
        let previous = self
            .options
            .get(domain)
            .ok_or_else(|| KeepaliveError::NotStarted(domain.to_string()))?;
        self.options.insert(domain, options);

        info!(domain = %domain, "Push keepalive reloaded");

        if !previous.wake_on_start && options.wake_on_start {
            Ok(self.bulk_waker.wake_all(domain).await)
        } else {
            Ok(0)
        }
    }

    /// 在服务域上停止保活；没有服务域时从管线移除阶段
    pub fn stop(&self, domain: &str) -> Result<()> {
        self.options
            .remove(domain)
            .ok_or_else(|| KeepaliveError::NotStarted(domain.to_string()))?;

        if self.options.is_empty() {
            self.pipeline.unregister(PUSH_KEEPALIVE_STAGE);
        }
        info!(domain = %domain, "Push keepalive stopped");
        Ok(())
    }

    /// 服务域当前生效的选项
    pub fn options(&self, domain: &str) -> Option<KeepaliveOptions> {
        self.options.get(domain)
    }

    /// 按配置启动所有显式配置的服务域
    pub async fn start_all(&self, config: &KeepaliveAppConfig) -> Result<usize> {
        let mut dispatched = 0;
        for domain in config.hosts() {
            dispatched += self.start(&domain, config.host_options(&domain)).await?;
        }
        Ok(dispatched)
    }
}
