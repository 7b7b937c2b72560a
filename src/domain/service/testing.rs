//! 单元测试用的协作方替身

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::model::{
    NotifyOutcome, PushSession, ResponseSink, Stanza, TimerRef, WakeTarget,
};
use crate::domain::repository::{
    PushNotifier, PushSessionRegistry, StreamResumption, WakeScheduler,
};
use crate::error::{KeepaliveError, Result};

/// 流管理层替身
pub struct FakeStream {
    pub timeout: Duration,
    pub queue: Vec<Stanza>,
}

impl FakeStream {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            queue: Vec::new(),
        }
    }
}

impl StreamResumption for FakeStream {
    fn resume_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_resume_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn queued(&self) -> &[Stanza] {
        &self.queue
    }

    fn enqueue(&mut self, stanza: Stanza) {
        self.queue.push(stanza);
    }

    fn drain_queued(&mut self) -> Vec<Stanza> {
        std::mem::take(&mut self.queue)
    }
}

/// 记录调度与取消的定时器替身，不会真正触发
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(TimerRef, Duration)>>,
    cancelled: Mutex<Vec<TimerRef>>,
}

impl RecordingScheduler {
    pub fn scheduled(&self) -> Vec<Duration> {
        self.scheduled.lock().unwrap().iter().map(|(_, d)| *d).collect()
    }

    pub fn cancelled(&self) -> Vec<TimerRef> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn outstanding(&self) -> Vec<TimerRef> {
        let cancelled = self.cancelled.lock().unwrap();
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(timer, _)| *timer)
            .filter(|timer| !cancelled.contains(timer))
            .collect()
    }
}

impl WakeScheduler for RecordingScheduler {
    fn schedule(&self, delay: Duration) -> TimerRef {
        let timer = TimerRef::new();
        self.scheduled.lock().unwrap().push((timer, delay));
        timer
    }

    fn cancel(&self, timer: &TimerRef) {
        self.cancelled.lock().unwrap().push(*timer);
    }

    fn cancel_all(&self) {
        let outstanding = self.outstanding();
        self.cancelled.lock().unwrap().extend(outstanding);
    }
}

/// 记录通知对象的推送替身
#[derive(Default)]
pub struct RecordingNotifier {
    targets: Mutex<Vec<WakeTarget>>,
    fail: bool,
}

impl RecordingNotifier {
    /// 每次投递都以失败回传
    pub fn failing() -> Self {
        Self {
            targets: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn targets(&self) -> Vec<WakeTarget> {
        self.targets.lock().unwrap().clone()
    }
}

impl PushNotifier for RecordingNotifier {
    fn notify(&self, target: WakeTarget, response: ResponseSink) {
        self.targets.lock().unwrap().push(target);
        let outcome = if self.fail {
            NotifyOutcome::Failed("gateway unavailable".to_string())
        } else {
            NotifyOutcome::Delivered
        };
        response.complete(outcome);
    }
}

/// 固定内容的推送会话注册表
#[derive(Default)]
pub struct StaticRegistry {
    sessions: DashMap<String, Vec<PushSession>>,
}

impl StaticRegistry {
    pub fn add(&self, domain: &str, sessions: Vec<PushSession>) {
        self.sessions.insert(domain.to_string(), sessions);
    }
}

#[async_trait]
impl PushSessionRegistry for StaticRegistry {
    async fn lookup_sessions(&self, domain: &str) -> Result<Vec<PushSession>> {
        Ok(self
            .sessions
            .get(domain)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// 查询总是失败的注册表
pub struct FailingRegistry;

#[async_trait]
impl PushSessionRegistry for FailingRegistry {
    async fn lookup_sessions(&self, _domain: &str) -> Result<Vec<PushSession>> {
        Err(KeepaliveError::Registry("database unavailable".to_string()))
    }
}
