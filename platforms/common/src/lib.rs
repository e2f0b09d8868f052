use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

mod emoji;
mod metrics;
mod notification;

pub use emoji::expand_shortcodes;
pub use metrics::{CounterKind, CounterMetrics, CounterSample, PushMetrics};
pub use notification::{DeviceTarget, Notification, PushType};

/// 推送平台错误类型
///
/// 适配器返回给分发器，由分发器记录统计后归约为一个 [`Outcome`]。
#[derive(Debug, Clone, thiserror::Error)]
pub enum PushError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Rejected(String),

    /// 厂商判定 token 失效，携带厂商错误码
    #[error("{0}")]
    InvalidToken(String),
}

/// 推送厂商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Fcm,
    Huawei,
    Xiaomi,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Fcm, Provider::Huawei, Provider::Xiaomi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Fcm => "fcm",
            Provider::Huawei => "huawei",
            Provider::Xiaomi => "xiaomi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fcm" => Some(Provider::Fcm),
            "huawei" => Some(Provider::Huawei),
            "xiaomi" => Some(Provider::Xiaomi),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 推送结果
///
/// 每次分发恰好产生一个结果。序列化为
/// `{"status":"OK"}` / `{"status":"FAIL","error":"..."}` / `{"status":"REMOVE"}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error")]
pub enum Outcome {
    #[serde(rename = "OK")]
    Delivered,
    #[serde(rename = "FAIL")]
    Failed(String),
    /// 设备 token 已失效，调用方需要删除
    #[serde(rename = "REMOVE")]
    RemoveToken,
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed(reason.into())
    }
}

impl From<PushError> for Outcome {
    fn from(err: PushError) -> Self {
        match err {
            PushError::InvalidToken(_) => Outcome::RemoveToken,
            other => Outcome::Failed(other.to_string()),
        }
    }
}

impl From<Result<(), PushError>> for Outcome {
    fn from(result: Result<(), PushError>) -> Self {
        match result {
            Ok(()) => Outcome::Delivered,
            Err(err) => err.into(),
        }
    }
}

/// 初始化配置trait
pub trait PushInitConfig: Send + Sync {
    /// 获取厂商
    fn provider(&self) -> Provider;

    /// 获取推送接口地址
    fn endpoint(&self) -> String;

    /// 获取密钥
    fn secret(&self) -> Option<&str>;

    /// 获取尝试次数（含首次）
    fn retry_count(&self) -> u32 {
        1
    }

    /// 校验凭证是否完整
    fn validate(&self) -> Result<(), PushError> {
        match self.secret() {
            Some(secret) if !secret.trim().is_empty() => Ok(()),
            _ => Err(PushError::Config(format!(
                "{} push notifications not configured, missing secret",
                self.provider()
            ))),
        }
    }
}

/// 推送适配器trait（用于dyn兼容）
///
/// 负责某一厂商的鉴权、payload 构建、网络调用以及响应归类。
#[async_trait]
pub trait PushAdapter: Send + Sync {
    /// 对应的厂商
    fn provider(&self) -> Provider;

    /// 发送推送，`token` 已去掉厂商前缀
    async fn send(&self, notification: &Notification, token: &str) -> Result<(), PushError>;
}

/// 适配器工厂trait
pub trait AdapterFactory: Send + Sync {
    /// 根据JSON Value创建适配器实例，`timeout` 作用于该适配器的每个请求
    fn create(&self, config: Value, timeout: Duration) -> Result<Arc<dyn PushAdapter>, PushError>;

    /// 获取厂商
    fn provider(&self) -> Provider;
}

/// 按统一超时构建 HTTP 客户端
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, PushError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PushError::Config(format!("failed to build http client: {e}")))
}

/// 当前 Unix 时间戳（秒）
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
