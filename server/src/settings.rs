use anyhow::{Context, Result};
use common::Provider;
use log::*;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "PUSH_SERVER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

fn default_listen_address() -> String {
    "127.0.0.1:8066".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// 推送服务配置
///
/// `providers` 中每一项原样交给对应厂商的适配器工厂解析。
#[derive(Debug, Clone, Deserialize)]
pub struct PushSettings {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// 每次厂商调用的超时时间（秒），所有适配器共用
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub providers: BTreeMap<String, Value>,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            timeout_secs: default_timeout_secs(),
            providers: BTreeMap::new(),
        }
    }
}

impl PushSettings {
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: PushSettings =
            serde_json::from_str(text).context("failed to parse push settings")?;
        for name in settings.providers.keys() {
            if Provider::parse(name).is_none() {
                warn!("Ignoring settings for unknown provider: {}", name);
            }
        }
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_json(&text)
    }

    /// 从 `PUSH_SERVER_CONFIG` 指定的文件加载，未设置时读取 `config.json`
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        info!("Loading push settings from {}", path);
        Self::from_file(path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn provider_config(&self, provider: Provider) -> Option<Value> {
        self.providers
            .iter()
            .find(|(name, _)| Provider::parse(name) == Some(provider))
            .map(|(_, config)| config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = PushSettings::from_json("{}").unwrap();
        assert_eq!(settings.listen_address, "127.0.0.1:8066");
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(settings.provider_config(Provider::Fcm).is_none());
    }

    #[test]
    fn test_provider_lookup() {
        let settings = PushSettings::from_json(
            r#"{
                "timeout_secs": 5,
                "providers": {
                    "fcm": {"api_key": "key"},
                    "Huawei": {"app_id": "1", "app_secret": "s"},
                    "apns": {}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert_eq!(
            settings.provider_config(Provider::Fcm),
            Some(json!({"api_key": "key"}))
        );
        assert_eq!(
            settings.provider_config(Provider::Huawei),
            Some(json!({"app_id": "1", "app_secret": "s"}))
        );
        assert!(settings.provider_config(Provider::Xiaomi).is_none());
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let settings = PushSettings::from_json(r#"{"timeout_secs": 0}"#).unwrap();
        assert_eq!(settings.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_json() {
        assert!(PushSettings::from_json("not json").is_err());
        assert!(PushSettings::from_file("/nonexistent/push.json").is_err());
    }
}
