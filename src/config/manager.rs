//! 配置管理器 - 负责处理不同环境下的配置选择和覆盖
//!
//! 该模块提供了配置管理功能，包括：
//! - 加载环境特定配置
//! - 应用环境变量覆盖

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;
use tracing::{debug, warn};

use super::{KeepaliveAppConfig, load_toml_value, merge_value};

const ENV_RESUME_TIMEOUT: &str = "PUSH_KEEPALIVE_RESUME_TIMEOUT_SECONDS";
const ENV_WAKE_ON_START: &str = "PUSH_KEEPALIVE_WAKE_ON_START";
const ENV_WAKE_ON_TIMEOUT: &str = "PUSH_KEEPALIVE_WAKE_ON_TIMEOUT";

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取当前环境名称
    ///
    /// 从环境变量 FLARE_ENV 获取当前环境名称，
    /// 如果未设置则默认为 "development"
    pub fn get_environment() -> String {
        env::var("FLARE_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置
    ///
    /// 加载 `{environments_dir}/{environment}.toml` 并深度合并到基础配置中，
    /// 文件不存在时保持不变。
    pub fn load_environment_config(base: &mut Value, environments_dir: &Path) -> Result<()> {
        let env_config_path = environments_dir.join(format!("{}.toml", Self::get_environment()));

        if env_config_path.exists() {
            let env_config = load_toml_value(&env_config_path)
                .with_context(|| format!("无效的环境配置: {}", env_config_path.display()))?;
            merge_value(base, env_config);
            debug!(path = %env_config_path.display(), "Applied environment configuration");
        }

        Ok(())
    }

    /// 应用环境变量覆盖（只作用于默认段）
    ///
    /// `lookup` 一般为 `std::env::var`，无法解析的值记录告警后忽略。
    pub fn apply_env_overrides<F>(config: &mut KeepaliveAppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = &mut config.push_keepalive.defaults;

        if let Some(raw) = lookup(ENV_RESUME_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => defaults.resume_timeout_seconds = Some(secs),
                Err(err) => warn!(key = ENV_RESUME_TIMEOUT, value = %raw, error = %err, "Ignoring invalid override"),
            }
        }

        for (key, slot) in [
            (ENV_WAKE_ON_START, &mut defaults.wake_on_start),
            (ENV_WAKE_ON_TIMEOUT, &mut defaults.wake_on_timeout),
        ] {
            if let Some(raw) = lookup(key) {
                match parse_bool(&raw) {
                    Some(value) => *slot = Some(value),
                    None => warn!(key, value = %raw, "Ignoring invalid override"),
                }
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_apply_to_defaults() {
        let mut cfg = KeepaliveAppConfig::default();
        ConfigManager::apply_env_overrides(
            &mut cfg,
            lookup_from(&[
                (ENV_RESUME_TIMEOUT, "900"),
                (ENV_WAKE_ON_START, "yes"),
                (ENV_WAKE_ON_TIMEOUT, "false"),
            ]),
        );

        let options = cfg.default_options();
        assert_eq!(options.resume_timeout, Some(Duration::from_secs(900)));
        assert!(options.wake_on_start);
        assert!(!options.wake_on_timeout);
    }

    #[test]
    fn test_invalid_env_override_is_ignored() {
        let mut cfg = KeepaliveAppConfig::default();
        ConfigManager::apply_env_overrides(
            &mut cfg,
            lookup_from(&[(ENV_RESUME_TIMEOUT, "soon"), (ENV_WAKE_ON_START, "maybe")]),
        );
        assert_eq!(cfg.default_options(), super::super::KeepaliveOptions::default());
    }

    #[test]
    fn test_missing_environment_file_is_noop() -> Result<()> {
        let mut value: Value = toml::from_str("[push_keepalive]\nwake_on_start = true\n")?;
        let before = value.clone();
        ConfigManager::load_environment_config(&mut value, Path::new("/nonexistent/environments"))?;
        assert_eq!(value, before);
        Ok(())
    }
}
