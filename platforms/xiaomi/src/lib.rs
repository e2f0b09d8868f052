use async_trait::async_trait;
use common::{
    AdapterFactory, Notification, Provider, PushAdapter, PushError, PushInitConfig,
    build_http_client, unix_timestamp,
};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://api.xmpush.xiaomi.com/v3/message/regid";
const DEFAULT_PACKAGE_NAME: &str = "com.steedos.messenger";
const SUCCESS_RESULT: &str = "ok";

const SEND_ERROR: &str = "xiaomi: send error";
const READ_RESPONSE_ERROR: &str = "xiaomi: read response error";
const PUSH_ERROR: &str = "xiaomi: push error";

fn default_push_url() -> String {
    BASE_URL.to_string()
}

fn default_package_name() -> String {
    DEFAULT_PACKAGE_NAME.to_string()
}

/// 小米推送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XiaomiConfig {
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_package_name")]
    pub restricted_package_name: String,
    #[serde(default = "default_push_url")]
    pub push_url: String,
}

impl XiaomiConfig {
    pub fn new(app_secret: impl Into<String>) -> Self {
        Self {
            app_secret: app_secret.into(),
            restricted_package_name: default_package_name(),
            push_url: default_push_url(),
        }
    }
}

impl PushInitConfig for XiaomiConfig {
    fn provider(&self) -> Provider {
        Provider::Xiaomi
    }

    fn endpoint(&self) -> String {
        self.push_url.clone()
    }

    fn secret(&self) -> Option<&str> {
        Some(&self.app_secret)
    }
}

/// 小米推送适配器
pub struct XiaomiAdapter {
    config: XiaomiConfig,
    http_client: Client,
}

impl XiaomiAdapter {
    pub fn new(config: XiaomiConfig, timeout: Duration) -> Result<Self, PushError> {
        config.validate()?;
        Ok(Self {
            config,
            http_client: build_http_client(timeout)?,
        })
    }

    /// 构建 `v3/message/regid` 表单
    pub fn build_form(
        &self,
        notification: &Notification,
        registration_id: &str,
        timestamp: i64,
    ) -> Vec<(&'static str, String)> {
        let mut data = notification.to_data();
        data.insert("google.message_id".into(), json!(timestamp.to_string()));

        let description = data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let title = data
            .get("sender_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        vec![
            ("description", description),
            ("notify_type", "-1".to_string()),
            ("pass_through", "1".to_string()),
            ("payload", Value::Object(data).to_string()),
            ("registration_id", registration_id.to_string()),
            (
                "restricted_package_name",
                self.config.restricted_package_name.clone(),
            ),
            ("title", title),
        ]
    }

    /// 根据推送响应归类结果
    pub fn classify(response: &XiaomiResponse) -> Result<(), PushError> {
        if response.result.as_deref() == Some(SUCCESS_RESULT) {
            Ok(())
        } else {
            Err(PushError::Rejected(PUSH_ERROR.to_string()))
        }
    }

    async fn push(
        &self,
        notification: &Notification,
        registration_id: &str,
    ) -> Result<(), PushError> {
        let form = self.build_form(notification, registration_id, unix_timestamp());

        let response = self
            .http_client
            .post(self.config.endpoint())
            .header("Authorization", format!("key={}", self.config.app_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Xiaomi push request failed: {}", e);
                PushError::Transport(SEND_ERROR.to_string())
            })?;

        let text = response.text().await.map_err(|e| {
            error!("Failed to read xiaomi push response: {}", e);
            PushError::Decode(READ_RESPONSE_ERROR.to_string())
        })?;

        let result: XiaomiResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to decode xiaomi push response: {}, body: {}", e, text);
            PushError::Decode(READ_RESPONSE_ERROR.to_string())
        })?;

        Self::classify(&result).inspect_err(|_| {
            error!(
                "Xiaomi push rejected: code={:?} reason={:?} body={}",
                result.code, result.reason, text
            );
        })
    }
}

#[async_trait]
impl PushAdapter for XiaomiAdapter {
    fn provider(&self) -> Provider {
        Provider::Xiaomi
    }

    async fn send(&self, notification: &Notification, token: &str) -> Result<(), PushError> {
        info!(
            "Sending android push notification via xiaomi for type={} sid={:?}",
            notification.push_type, notification.server_id
        );
        self.push(notification, token).await
    }
}

// --- Xiaomi API Response Structs ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XiaomiResponse {
    pub result: Option<String>,
    pub code: Option<i64>,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub trace_id: Option<String>,
}

// --- Adapter Factory ---

pub struct XiaomiAdapterFactory;

impl AdapterFactory for XiaomiAdapterFactory {
    fn create(&self, config: Value, timeout: Duration) -> Result<Arc<dyn PushAdapter>, PushError> {
        let config: XiaomiConfig =
            serde_json::from_value(config).map_err(|e| PushError::Config(e.to_string()))?;
        let adapter = XiaomiAdapter::new(config, timeout)?;
        Ok(Arc::new(adapter))
    }

    fn provider(&self) -> Provider {
        Provider::Xiaomi
    }
}
