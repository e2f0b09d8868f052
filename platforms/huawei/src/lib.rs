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

pub mod content_filter;

pub use content_filter::filter_content;

const TOKEN_URL: &str = "https://login.cloud.huawei.com/oauth2/v2/token";
const PUSH_URL: &str = "https://api.push.hicloud.com/pushsend.do";
const NSP_SVC: &str = "openpush.message.api.send";
const SUCCESS_CODE: &str = "80000000";

const GET_TOKEN_ERROR: &str = "huawei: get access_token error";
const READ_TOKEN_ERROR: &str = "huawei: read access_token error";
const SEND_ERROR: &str = "huawei: send error";
const READ_RESPONSE_ERROR: &str = "huawei: read response error";
const PUSH_ERROR: &str = "huawei: push error";

fn default_token_url() -> String {
    TOKEN_URL.to_string()
}

fn default_push_url() -> String {
    PUSH_URL.to_string()
}

/// 华为推送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuaweiConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_push_url")]
    pub push_url: String,
}

impl HuaweiConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            token_url: default_token_url(),
            push_url: default_push_url(),
        }
    }
}

impl PushInitConfig for HuaweiConfig {
    fn provider(&self) -> Provider {
        Provider::Huawei
    }

    fn endpoint(&self) -> String {
        self.push_url.clone()
    }

    fn secret(&self) -> Option<&str> {
        Some(&self.app_secret)
    }

    fn validate(&self) -> Result<(), PushError> {
        if self.app_id.trim().is_empty() || self.app_secret.trim().is_empty() {
            return Err(PushError::Config(
                "huawei push notifications not configured, missing app_id or app_secret"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// 华为推送适配器
///
/// 每次推送先用 client_credentials 换取 access_token，再调用 `pushsend.do`。
pub struct HuaweiAdapter {
    config: HuaweiConfig,
    http_client: Client,
}

impl HuaweiAdapter {
    pub fn new(config: HuaweiConfig, timeout: Duration) -> Result<Self, PushError> {
        config.validate()?;
        Ok(Self {
            config,
            http_client: build_http_client(timeout)?,
        })
    }

    /// 构建 `{"hps":{"msg":{"type":1,"body":...}}}` 负载
    pub fn build_payload(notification: &Notification, timestamp: i64) -> Value {
        let mut body = notification.to_data();
        let content = body.get("message").cloned().unwrap_or(Value::Null);
        body.insert("google.message_id".into(), json!(timestamp.to_string()));
        body.insert("content".into(), content);
        body.insert("title".into(), json!(notification.sender_name));

        json!({
            "hps": {
                "msg": {
                    "type": 1,
                    "body": body,
                }
            }
        })
    }

    /// 构建推送表单，`payload` 须已经过内容过滤
    pub fn build_push_form(
        access_token: &str,
        token: &str,
        payload: &str,
        timestamp: i64,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("access_token", access_token.to_string()),
            ("device_token_list", json!([token]).to_string()),
            ("nsp_svc", NSP_SVC.to_string()),
            ("nsp_ts", timestamp.to_string()),
            ("payload", payload.to_string()),
        ]
    }

    /// `nsp_ctx` 查询参数
    pub fn nsp_context(&self) -> String {
        json!({
            "ver": "1",
            "appId": self.config.app_id,
        })
        .to_string()
    }

    /// 根据推送响应归类结果
    pub fn classify(response: &HuaweiPushResponse) -> Result<(), PushError> {
        match response.code.as_ref().and_then(Value::as_str) {
            Some(SUCCESS_CODE) => Ok(()),
            _ => Err(PushError::Rejected(PUSH_ERROR.to_string())),
        }
    }

    async fn request_access_token(&self) -> Result<String, PushError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_secret", self.config.app_secret.as_str()),
            ("client_id", self.config.app_id.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Huawei access_token request failed: {}", e);
                PushError::Transport(GET_TOKEN_ERROR.to_string())
            })?;

        let text = response.text().await.map_err(|e| {
            error!("Failed to read huawei access_token body: {}", e);
            PushError::Decode(READ_TOKEN_ERROR.to_string())
        })?;

        let token: HuaweiTokenResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to decode huawei access_token: {}, body: {}", e, text);
            PushError::Decode(READ_TOKEN_ERROR.to_string())
        })?;

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(access_token),
            _ => {
                error!("Huawei access_token missing, body: {}", text);
                Err(PushError::Decode(READ_TOKEN_ERROR.to_string()))
            }
        }
    }

    async fn push(&self, notification: &Notification, token: &str) -> Result<(), PushError> {
        let access_token = self.request_access_token().await?;

        let timestamp = unix_timestamp();
        let payload = Self::build_payload(notification, timestamp).to_string();
        let filtered = filter_content(&payload);
        let form = Self::build_push_form(&access_token, token, &filtered, timestamp);

        let response = self
            .http_client
            .post(&self.config.push_url)
            .query(&[("nsp_ctx", self.nsp_context())])
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Huawei push request failed: {}", e);
                PushError::Transport(SEND_ERROR.to_string())
            })?;

        let text = response.text().await.map_err(|e| {
            error!("Failed to read huawei push response: {}", e);
            PushError::Decode(READ_RESPONSE_ERROR.to_string())
        })?;

        let result: HuaweiPushResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to decode huawei push response: {}, body: {}", e, text);
            PushError::Decode(READ_RESPONSE_ERROR.to_string())
        })?;

        Self::classify(&result).inspect_err(|_| {
            error!(
                "Huawei push rejected: code={:?} msg={:?} body={} payload={}",
                result.code, result.msg, text, payload
            );
        })
    }
}

#[async_trait]
impl PushAdapter for HuaweiAdapter {
    fn provider(&self) -> Provider {
        Provider::Huawei
    }

    async fn send(&self, notification: &Notification, token: &str) -> Result<(), PushError> {
        info!(
            "Sending android push notification via huawei for type={} sid={:?}",
            notification.push_type, notification.server_id
        );
        self.push(notification, token).await
    }
}

// --- Huawei API Response Structs ---

#[derive(Debug, Deserialize)]
struct HuaweiTokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HuaweiPushResponse {
    pub code: Option<Value>,
    pub msg: Option<String>,
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
}

// --- Adapter Factory ---

pub struct HuaweiAdapterFactory;

impl AdapterFactory for HuaweiAdapterFactory {
    fn create(&self, config: Value, timeout: Duration) -> Result<Arc<dyn PushAdapter>, PushError> {
        let config: HuaweiConfig =
            serde_json::from_value(config).map_err(|e| PushError::Config(e.to_string()))?;
        let adapter = HuaweiAdapter::new(config, timeout)?;
        Ok(Arc::new(adapter))
    }

    fn provider(&self) -> Provider {
        Provider::Huawei
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Outcome, PushType};

    fn message_notification() -> Notification {
        let mut notification = Notification::new("android_rn:huawei:TOKEN123", PushType::Message);
        notification.message = Some("hello".to_string());
        notification.sender_name = "alice".to_string();
        notification
    }

    #[test]
    fn test_build_payload_shape() {
        let payload = HuaweiAdapter::build_payload(&message_notification(), 1_700_000_000);
        let body = &payload["hps"]["msg"]["body"];

        assert_eq!(payload["hps"]["msg"]["type"], 1);
        assert_eq!(body["google.message_id"], "1700000000");
        assert_eq!(body["content"], "hello");
        assert_eq!(body["message"], "hello");
        assert_eq!(body["title"], "alice");
    }

    #[test]
    fn test_build_payload_without_message_has_null_content() {
        let notification = Notification::new("huawei:abc", PushType::Clear);
        let payload = HuaweiAdapter::build_payload(&notification, 1);
        assert!(payload["hps"]["msg"]["body"]["content"].is_null());
    }

    #[test]
    fn test_emoji_expanded_before_filtering() {
        let mut notification = message_notification();
        notification.message = Some("nice :smile:".to_string());

        let payload = HuaweiAdapter::build_payload(&notification, 1).to_string();
        let filtered: Value = serde_json::from_str(&filter_content(&payload)).unwrap();
        assert_eq!(filtered["hps"]["msg"]["body"]["message"], "nice \u{1F604}");
        assert_eq!(filtered["hps"]["msg"]["body"]["content"], "nice \u{1F604}");
    }

    #[test]
    fn test_build_push_form() {
        let notification = message_notification();
        let form = HuaweiAdapter::build_push_form("AT", notification.device.token(), "{}", 42);

        assert_eq!(
            form,
            vec![
                ("access_token", "AT".to_string()),
                ("device_token_list", r#"["TOKEN123"]"#.to_string()),
                ("nsp_svc", "openpush.message.api.send".to_string()),
                ("nsp_ts", "42".to_string()),
                ("payload", "{}".to_string()),
            ]
        );
    }

    #[test]
    fn test_filtered_payload_keeps_structure() {
        let mut notification = message_notification();
        notification.message = Some("jb j8 sm ok".to_string());

        let payload = HuaweiAdapter::build_payload(&notification, 1).to_string();
        let filtered: Value = serde_json::from_str(&filter_content(&payload)).unwrap();
        assert_eq!(filtered["hps"]["msg"]["body"]["message"], "__ __ __ ok");
        assert_eq!(filtered["hps"]["msg"]["body"]["content"], "__ __ __ ok");
    }

    #[test]
    fn test_nsp_context() {
        let config = HuaweiConfig::new("app-1", "secret");
        let adapter = HuaweiAdapter::new(config, Duration::from_secs(5)).unwrap();
        let ctx: Value = serde_json::from_str(&adapter.nsp_context()).unwrap();
        assert_eq!(ctx, json!({"ver": "1", "appId": "app-1"}));
    }

    #[test]
    fn test_classify() {
        let ok = HuaweiPushResponse {
            code: Some(json!("80000000")),
            ..Default::default()
        };
        assert!(HuaweiAdapter::classify(&ok).is_ok());

        let rejected = HuaweiPushResponse {
            code: Some(json!("80300007")),
            msg: Some("All the tokens are invalid".to_string()),
            ..Default::default()
        };
        let outcome: Outcome = HuaweiAdapter::classify(&rejected).into();
        assert_eq!(outcome, Outcome::failed(PUSH_ERROR));

        // 数字形式的 code 不视为成功
        let numeric = HuaweiPushResponse {
            code: Some(json!(80000000)),
            ..Default::default()
        };
        assert!(HuaweiAdapter::classify(&numeric).is_err());
    }

    #[test]
    fn test_config_requires_app_id_and_secret() {
        let result =
            HuaweiAdapterFactory.create(json!({"app_secret": "s"}), Duration::from_secs(5));
        assert!(matches!(result, Err(PushError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint() {
        let mut config = HuaweiConfig::new("app", "secret");
        config.token_url = "http://127.0.0.1:1/oauth2/v2/token".to_string();
        let adapter = HuaweiAdapter::new(config, Duration::from_secs(2)).unwrap();

        let outcome: Outcome = adapter.send(&message_notification(), "TOKEN123").await.into();
        assert_eq!(outcome, Outcome::failed(GET_TOKEN_ERROR));
    }
}
