//! # Prometheus 指标收集模块
//!
//! 推送保活的覆盖、唤醒与批量唤醒指标。

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Result;

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// 唤醒来源：会话超时前唤醒
pub const WAKE_PATH_TIMEOUT: &str = "timeout";
/// 唤醒来源：批量唤醒
pub const WAKE_PATH_BULK: &str = "bulk";

/// 推送保活指标
#[derive(Clone)]
pub struct KeepaliveMetrics {
    /// 恢复超时被覆盖次数
    pub overrides_applied: IntCounter,
    /// 恢复超时被还原次数
    pub overrides_restored: IntCounter,
    /// 唤醒定时器调度次数
    pub wake_timers_scheduled: IntCounter,
    /// 唤醒定时器取消次数
    pub wake_timers_cancelled: IntCounter,
    /// 过期定时器触发（句柄不匹配）次数
    pub stale_timer_fires: IntCounter,
    /// 唤醒通知发送数（按来源）
    pub wake_notifications: IntCounterVec,
    /// 因唤醒后仍未恢复而终止的会话数
    pub sessions_terminated: IntCounter,
}

impl KeepaliveMetrics {
    /// 创建并注册到指定 Registry
    pub fn new(registry: &Registry) -> Result<Self> {
        let overrides_applied = IntCounter::new(
            "push_keepalive_overrides_applied_total",
            "Number of times the resume timeout was overridden for a pending push session",
        )?;
        let overrides_restored = IntCounter::new(
            "push_keepalive_overrides_restored_total",
            "Number of times the original resume timeout was restored",
        )?;
        let wake_timers_scheduled = IntCounter::new(
            "push_keepalive_wake_timers_scheduled_total",
            "Number of wake timers scheduled",
        )?;
        let wake_timers_cancelled = IntCounter::new(
            "push_keepalive_wake_timers_cancelled_total",
            "Number of wake timers cancelled before firing",
        )?;
        let stale_timer_fires = IntCounter::new(
            "push_keepalive_stale_timer_fires_total",
            "Number of wake timer events ignored because the handle no longer matched",
        )?;
        let wake_notifications = IntCounterVec::new(
            Opts::new(
                "push_keepalive_wake_notifications_total",
                "Number of wake-up notifications dispatched",
            ),
            &["path"],
        )?;
        let sessions_terminated = IntCounter::new(
            "push_keepalive_sessions_terminated_total",
            "Number of pending sessions terminated after a wake-up notification",
        )?;

        registry.register(Box::new(overrides_applied.clone()))?;
        registry.register(Box::new(overrides_restored.clone()))?;
        registry.register(Box::new(wake_timers_scheduled.clone()))?;
        registry.register(Box::new(wake_timers_cancelled.clone()))?;
        registry.register(Box::new(stale_timer_fires.clone()))?;
        registry.register(Box::new(wake_notifications.clone()))?;
        registry.register(Box::new(sessions_terminated.clone()))?;

        Ok(Self {
            overrides_applied,
            overrides_restored,
            wake_timers_scheduled,
            wake_timers_cancelled,
            stale_timer_fires,
            wake_notifications,
            sessions_terminated,
        })
    }

    /// 使用独立 Registry 创建（测试或多实例场景）
    pub fn unregistered() -> Self {
        Self::new(&Registry::new()).expect("Failed to create keepalive metrics")
    }

    pub fn record_wake(&self, path: &str) {
        self.wake_notifications.with_label_values(&[path]).inc();
    }

    pub fn wakes(&self, path: &str) -> u64 {
        self.wake_notifications.with_label_values(&[path]).get()
    }
}

/// 以文本格式导出注册表中的指标
pub fn gather_text(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
