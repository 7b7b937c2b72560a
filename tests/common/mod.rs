// 集成测试共用的协作方替身
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flare_push_keepalive::{
    ChatMessageClassifier, HookDispatcher, HookPipeline, KeepaliveError, KeepaliveMetrics,
    KeepaliveOptions, NotifyOutcome, Placement, PushKeepaliveModule, PushNotifier, PushSession,
    PushSessionRegistry, ResponseSink, Result, StreamMgmtStage, WakeTarget,
};
use flare_push_keepalive::runtime::{PUSH_STAGE, PushStage, STREAM_MGMT_STAGE};

pub const DOMAIN: &str = "example.com";
pub const OWNER: &str = "alice@example.com/phone";

#[derive(Default)]
pub struct RecordingNotifier {
    targets: Mutex<Vec<WakeTarget>>,
}

impl RecordingNotifier {
    pub fn targets(&self) -> Vec<WakeTarget> {
        self.targets.lock().unwrap().clone()
    }
}

impl PushNotifier for RecordingNotifier {
    fn notify(&self, target: WakeTarget, response: ResponseSink) {
        self.targets.lock().unwrap().push(target);
        response.complete(NotifyOutcome::Delivered);
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    sessions: Mutex<Vec<(String, PushSession)>>,
    unavailable: bool,
}

impl MemoryRegistry {
    pub fn unavailable() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    pub fn add(&self, domain: &str, owner: &str) {
        self.sessions.lock().unwrap().push((
            domain.to_string(),
            PushSession {
                owner: owner.to_string(),
                target: format!("push.{domain}"),
                node: format!("node-{owner}"),
                config: Default::default(),
            },
        ));
    }
}

#[async_trait]
impl PushSessionRegistry for MemoryRegistry {
    async fn lookup_sessions(&self, domain: &str) -> Result<Vec<PushSession>> {
        if self.unavailable {
            return Err(KeepaliveError::Registry("registry offline".to_string()));
        }
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == domain)
            .map(|(_, session)| session.clone())
            .collect())
    }
}

pub struct Harness {
    pub pipeline: Arc<HookPipeline>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: Arc<MemoryRegistry>,
    pub metrics: Arc<KeepaliveMetrics>,
    pub module: PushKeepaliveModule,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_registry(MemoryRegistry::default())
    }

    /// 注册基础流管理与推送阶段
    pub fn with_registry(registry: MemoryRegistry) -> Self {
        let harness = Self::bare(registry);
        harness
            .pipeline
            .register(STREAM_MGMT_STAGE, Arc::new(StreamMgmtStage), Placement::Last)
            .unwrap();
        harness
            .pipeline
            .register(PUSH_STAGE, Arc::new(PushStage), Placement::Last)
            .unwrap();
        harness
    }

    pub fn without_base_stages() -> Self {
        Self::bare(MemoryRegistry::default())
    }

    fn bare(registry: MemoryRegistry) -> Self {
        let pipeline = HookPipeline::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = Arc::new(registry);
        let metrics = Arc::new(KeepaliveMetrics::unregistered());
        let module = PushKeepaliveModule::new(
            Arc::clone(&pipeline),
            notifier.clone(),
            registry.clone(),
            Arc::new(ChatMessageClassifier),
            Arc::clone(&metrics),
        );
        Self {
            pipeline,
            notifier,
            registry,
            metrics,
            module,
        }
    }

    pub fn dispatcher(&self) -> HookDispatcher {
        HookDispatcher::new(Arc::clone(&self.pipeline))
    }
}

pub fn options(resume_timeout: Duration) -> KeepaliveOptions {
    KeepaliveOptions {
        resume_timeout: Some(resume_timeout),
        wake_on_start: false,
        wake_on_timeout: true,
    }
}
