use async_trait::async_trait;
use common::{
    AdapterFactory, Notification, Provider, PushAdapter, PushError, PushInitConfig,
    build_http_client,
};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://fcm.googleapis.com/fcm/send";
const DEFAULT_ATTEMPTS: u32 = 2;
const TRANSPORT_ERROR: &str = "unknown transport error";
const DECODE_ERROR: &str = "fcm: read response error";

/// FCM 返回的需要删除 token 的错误码
const REMOVAL_ERRORS: [&str; 3] = ["InvalidRegistration", "NotRegistered", "MissingRegistration"];

fn default_endpoint() -> String {
    BASE_URL.to_string()
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

/// FCM 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 总尝试次数（含首次）
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

impl FcmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: default_endpoint(),
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

impl PushInitConfig for FcmConfig {
    fn provider(&self) -> Provider {
        Provider::Fcm
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn secret(&self) -> Option<&str> {
        Some(&self.api_key)
    }

    fn retry_count(&self) -> u32 {
        self.attempts.clamp(1, DEFAULT_ATTEMPTS)
    }
}

/// FCM 推送适配器（legacy HTTP 接口）
pub struct FcmAdapter {
    config: FcmConfig,
    http_client: Client,
}

impl FcmAdapter {
    pub fn new(config: FcmConfig, timeout: Duration) -> Result<Self, PushError> {
        config.validate()?;
        Ok(Self {
            config,
            http_client: build_http_client(timeout)?,
        })
    }

    /// 构建 FCM 消息，`to` 为完整设备标识
    pub fn build_message(notification: &Notification, token: &str) -> FcmMessage {
        FcmMessage {
            to: token.to_string(),
            data: notification.to_data(),
            priority: "high".to_string(),
        }
    }

    /// 根据 FCM 响应归类结果
    pub fn classify(response: &FcmResponse) -> Result<(), PushError> {
        if response.failure == 0 {
            return Ok(());
        }

        let reason = response
            .results
            .first()
            .and_then(|result| result.error.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        if REMOVAL_ERRORS.contains(&reason.as_str()) {
            Err(PushError::InvalidToken(reason))
        } else {
            Err(PushError::Rejected(reason))
        }
    }

    async fn send_request(&self, message: &FcmMessage) -> Result<FcmResponse, PushError> {
        let attempts = self.config.retry_count();
        let mut attempt = 0;

        let text = loop {
            attempt += 1;
            let result = self
                .http_client
                .post(self.config.endpoint())
                .header("Authorization", format!("key={}", self.config.api_key))
                .json(message)
                .send()
                .await;

            let retryable = match result {
                Ok(response) if response.status().is_success() => {
                    break response.text().await.map_err(|e| {
                        error!("Failed to read FCM response body: {}", e);
                        PushError::Decode(DECODE_ERROR.to_string())
                    })?;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    error!("FCM request failed with status: {}, body: {}", status, body);
                    status.is_server_error()
                }
                Err(e) => {
                    error!("FCM request error on attempt {}/{}: {}", attempt, attempts, e);
                    true
                }
            };

            if !retryable || attempt >= attempts {
                return Err(PushError::Transport(TRANSPORT_ERROR.to_string()));
            }
            debug!("Retrying FCM request, attempt {}/{}", attempt + 1, attempts);
        };

        serde_json::from_str(&text).map_err(|e| {
            error!("Failed to decode FCM response: {}, body: {}", e, text);
            PushError::Decode(DECODE_ERROR.to_string())
        })
    }
}

#[async_trait]
impl PushAdapter for FcmAdapter {
    fn provider(&self) -> Provider {
        Provider::Fcm
    }

    async fn send(&self, notification: &Notification, token: &str) -> Result<(), PushError> {
        let message = Self::build_message(notification, token);
        info!(
            "Sending android push notification via fcm for type={} sid={:?}",
            notification.push_type, notification.server_id
        );

        let response = self.send_request(&message).await.inspect_err(|e| {
            error!(
                "Failed to send FCM push sid={:?} did={} err={}",
                notification.server_id, token, e
            );
        })?;

        Self::classify(&response).inspect_err(|e| match e {
            PushError::InvalidToken(_) => {
                info!("FCM response failure sending remove code: {:?}", response)
            }
            _ => error!("FCM response failure: {:?}", response),
        })
    }
}

// --- FCM API Payload Structs ---

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    pub to: String,
    pub data: Map<String, Value>,
    pub priority: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcmResponse {
    #[serde(default)]
    pub multicast_id: i64,
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failure: u32,
    #[serde(default)]
    pub canonical_ids: u32,
    #[serde(default)]
    pub results: Vec<FcmResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcmResult {
    pub message_id: Option<String>,
    pub registration_id: Option<String>,
    pub error: Option<String>,
}

// --- Adapter Factory ---

pub struct FcmAdapterFactory;

impl AdapterFactory for FcmAdapterFactory {
    fn create(&self, config: Value, timeout: Duration) -> Result<Arc<dyn PushAdapter>, PushError> {
        let config: FcmConfig =
            serde_json::from_value(config).map_err(|e| PushError::Config(e.to_string()))?;
        let adapter = FcmAdapter::new(config, timeout)?;
        Ok(Arc::new(adapter))
    }

    fn provider(&self) -> Provider {
        Provider::Fcm
    }
}
