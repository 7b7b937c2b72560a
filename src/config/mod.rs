//! 推送保活配置模块
//!
//! 该模块提供了完整的配置管理功能，包括：
//! - 配置文件（单文件或目录）加载与合并
//! - 环境特定配置覆盖与环境变量覆盖
//! - 按服务域解析的保活选项

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dashmap::DashMap;
use serde::Deserialize;
use toml::Value;
use tracing::warn;

mod manager;
pub use manager::ConfigManager;

/// 默认的推送会话恢复超时（72 分钟）
pub const DEFAULT_RESUME_TIMEOUT: Duration = Duration::from_secs(72 * 60);

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 优先）
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    #[serde(default)]
    pub with_file: bool,
    #[serde(default)]
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// 单个服务域生效的保活选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveOptions {
    /// 挂起期间使用的恢复超时，`None` 表示不覆盖
    pub resume_timeout: Option<Duration>,
    /// 启动时唤醒全部推送会话
    pub wake_on_start: bool,
    /// 超时前调度唤醒
    pub wake_on_timeout: bool,
}

impl Default for KeepaliveOptions {
    fn default() -> Self {
        Self {
            resume_timeout: Some(DEFAULT_RESUME_TIMEOUT),
            wake_on_start: false,
            wake_on_timeout: true,
        }
    }
}

/// 配置文件中的保活选项（均可缺省）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct KeepaliveOptionsConfig {
    /// 恢复超时（秒），0 表示不覆盖
    #[serde(default)]
    pub resume_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub wake_on_start: Option<bool>,
    #[serde(default)]
    pub wake_on_timeout: Option<bool>,
}

impl KeepaliveOptionsConfig {
    /// 以 `base` 为底，覆盖本段中出现的字段
    pub fn overlay(&self, base: KeepaliveOptions) -> KeepaliveOptions {
        KeepaliveOptions {
            resume_timeout: match self.resume_timeout_seconds {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => base.resume_timeout,
            },
            wake_on_start: self.wake_on_start.unwrap_or(base.wake_on_start),
            wake_on_timeout: self.wake_on_timeout.unwrap_or(base.wake_on_timeout),
        }
    }
}

/// 推送保活服务配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PushKeepaliveServiceConfig {
    /// 所有服务域共用的默认值
    #[serde(flatten)]
    pub defaults: KeepaliveOptionsConfig,
    /// 按服务域的局部覆盖
    #[serde(default)]
    pub hosts: HashMap<String, KeepaliveOptionsConfig>,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct KeepaliveAppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub push_keepalive: PushKeepaliveServiceConfig,
}

impl KeepaliveAppConfig {
    /// 默认段解析出的选项
    pub fn default_options(&self) -> KeepaliveOptions {
        self.push_keepalive
            .defaults
            .overlay(KeepaliveOptions::default())
    }

    /// 指定服务域的选项，未出现的字段继承默认段
    pub fn host_options(&self, domain: &str) -> KeepaliveOptions {
        let defaults = self.default_options();
        match self.push_keepalive.hosts.get(domain) {
            Some(host) => host.overlay(defaults),
            None => defaults,
        }
    }

    /// 显式配置的服务域（排序后）
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.push_keepalive.hosts.keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

/// 运行期按服务域保存的保活选项
#[derive(Debug, Default)]
pub struct HostOptions {
    hosts: DashMap<String, KeepaliveOptions>,
}

impl HostOptions {
    pub fn get(&self, domain: &str) -> Option<KeepaliveOptions> {
        self.hosts.get(domain).map(|entry| *entry.value())
    }

    pub fn insert<D: Into<String>>(&self, domain: D, options: KeepaliveOptions) -> Option<KeepaliveOptions> {
        self.hosts.insert(domain.into(), options)
    }

    pub fn remove(&self, domain: &str) -> Option<KeepaliveOptions> {
        self.hosts.remove(domain).map(|(_, options)| options)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.hosts.contains_key(domain)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// 加载配置
///
/// 未指定路径时依次尝试 `config/` 目录和 `config.toml`，全部失败时使用默认配置。
/// 加载后依次应用环境配置文件与环境变量覆盖。
pub fn load_config(path: Option<&str>) -> KeepaliveAppConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => vec![PathBuf::from("config"), PathBuf::from("config.toml")],
    };

    let mut cfg = load_with_fallback(&candidates);
    ConfigManager::apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    cfg
}

/// 使用备选方案加载配置
fn load_with_fallback(candidates: &[PathBuf]) -> KeepaliveAppConfig {
    for path in candidates {
        match load_config_from_source(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err:#}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    KeepaliveAppConfig::default()
}

/// 从文件或目录加载配置（含环境配置文件覆盖）
pub fn load_config_from_source(path: &Path) -> Result<KeepaliveAppConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("unable to read metadata for {}", path.display()))?;

    let mut merged = if metadata.is_dir() {
        load_directory_value(path)?
    } else {
        load_toml_value(path)?
    };

    let environments = path
        .parent()
        .filter(|_| !metadata.is_dir())
        .unwrap_or(path)
        .join("environments");
    ConfigManager::load_environment_config(&mut merged, &environments)?;

    merged
        .try_into()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

/// 从 TOML 文本解析配置
pub fn parse_config(content: &str) -> Result<KeepaliveAppConfig> {
    toml::from_str(content).context("invalid config format")
}

/// 目录形式：base.toml + shared/ + services/ + overrides/
fn load_directory_value(path: &Path) -> Result<Value> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;
    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    for fragment in ["shared", "services", "overrides"] {
        merge_directory(&mut merged, &path.join(fragment))?;
    }

    Ok(merged)
}

/// 按文件名顺序合并目录中的 TOML 片段
fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
        })
        .collect::<Vec<_>>();

    entries.sort();

    for entry in entries {
        let value = load_toml_value(&entry)?;
        merge_value(root, value);
    }

    Ok(())
}

fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 深度合并：表逐键合并，其余类型整体替换
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_value(base_value, overlay_value),
                    None => {
                        base_table.insert(key, overlay_value);
                    }
                }
            }
        }
        (base, other) => *base = other,
    }
}
