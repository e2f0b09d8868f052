use crate::{Provider, expand_shortcodes};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

const HUAWEI_MARKER: &str = "huawei:";
const XIAOMI_MARKER: &str = "xiaomi:";

/// 推送类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushType {
    #[default]
    Message,
    Clear,
    UpdateBadge,
    Session,
}

impl PushType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushType::Message => "message",
            PushType::Clear => "clear",
            PushType::UpdateBadge => "update_badge",
            PushType::Session => "session",
        }
    }
}

impl fmt::Display for PushType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 目标设备
///
/// 由原始设备标识解析而来，携带厂商原生 token。
/// 解析顺序：包含 `huawei:` 的为华为，其次包含 `xiaomi:` 的为小米，其余走 FCM。
/// 华为与小米会去掉标记及其之前的全部内容，FCM 保留完整标识。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum DeviceTarget {
    Fcm(String),
    Huawei(String),
    Xiaomi(String),
}

impl DeviceTarget {
    pub fn parse(device_id: &str) -> Self {
        if let Some((_, token)) = device_id.split_once(HUAWEI_MARKER) {
            DeviceTarget::Huawei(token.to_string())
        } else if let Some((_, token)) = device_id.split_once(XIAOMI_MARKER) {
            DeviceTarget::Xiaomi(token.to_string())
        } else {
            DeviceTarget::Fcm(device_id.to_string())
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            DeviceTarget::Fcm(_) => Provider::Fcm,
            DeviceTarget::Huawei(_) => Provider::Huawei,
            DeviceTarget::Xiaomi(_) => Provider::Xiaomi,
        }
    }

    /// 厂商原生 token
    pub fn token(&self) -> &str {
        match self {
            DeviceTarget::Fcm(token)
            | DeviceTarget::Huawei(token)
            | DeviceTarget::Xiaomi(token) => token,
        }
    }
}

impl From<String> for DeviceTarget {
    fn from(device_id: String) -> Self {
        DeviceTarget::parse(&device_id)
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceTarget::Fcm(token) => f.write_str(token),
            DeviceTarget::Huawei(token) => write!(f, "{HUAWEI_MARKER}{token}"),
            DeviceTarget::Xiaomi(token) => write!(f, "{XIAOMI_MARKER}{token}"),
        }
    }
}

/// 推送通知
///
/// 调用方针对每个推送事件构建一次，分发期间不可变。
/// 只做入站解析，设备标识解析后不再还原。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    /// 客户端回执 ID
    #[serde(default)]
    pub ack_id: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(rename = "device_id")]
    pub device: DeviceTarget,
    #[serde(rename = "type", default)]
    pub push_type: PushType,
    #[serde(default)]
    pub badge: i32,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub override_username: String,
    #[serde(default)]
    pub override_icon_url: String,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub from_webhook: bool,
    #[serde(default)]
    pub version: String,
}

impl Notification {
    /// 创建一个只有目标设备的通知，其余字段取默认值
    pub fn new(device_id: &str, push_type: PushType) -> Self {
        Self {
            ack_id: None,
            server_id: None,
            device: DeviceTarget::parse(device_id),
            push_type,
            badge: 0,
            channel_id: String::new(),
            channel_name: String::new(),
            team_id: String::new(),
            sender_id: String::new(),
            sender_name: String::new(),
            message: None,
            post_id: String::new(),
            root_id: String::new(),
            override_username: String::new(),
            override_icon_url: String::new(),
            from_webhook: false,
            version: String::new(),
        }
    }

    /// 是否携带回执 ID
    pub fn has_ack(&self) -> bool {
        self.ack_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// 各厂商共用的扁平 data 负载
    ///
    /// 消息类字段只在 `message` 类型下出现。
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("ack_id".into(), json!(self.ack_id.as_deref().unwrap_or_default()));
        data.insert("type".into(), json!(self.push_type.as_str()));
        data.insert("badge".into(), json!(self.badge));
        data.insert("channel_id".into(), json!(self.channel_id));
        data.insert("team_id".into(), json!(self.team_id));
        data.insert("sender_id".into(), json!(self.sender_id));
        data.insert("sender_name".into(), json!(self.sender_name));
        data.insert("version".into(), json!(self.version));

        if self.push_type == PushType::Message {
            let message = expand_shortcodes(self.message.as_deref().unwrap_or_default());
            data.insert("message".into(), json!(message));
            data.insert("channel_name".into(), json!(self.channel_name));
            data.insert("post_id".into(), json!(self.post_id));
            data.insert("root_id".into(), json!(self.root_id));
            data.insert("override_username".into(), json!(self.override_username));
            data.insert("override_icon_url".into(), json!(self.override_icon_url));
            data.insert("from_webhook".into(), json!(self.from_webhook));
        }
        data
    }
}

/// 兼容 `true` 与 `"true"` 两种写法
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(text) => text.trim().eq_ignore_ascii_case("true"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_target_precedence() {
        assert_eq!(
            DeviceTarget::parse("android_rn:huawei:TOKEN123"),
            DeviceTarget::Huawei("TOKEN123".to_string())
        );
        assert_eq!(
            DeviceTarget::parse("xiaomi:REGID456"),
            DeviceTarget::Xiaomi("REGID456".to_string())
        );
        // huawei 优先于 xiaomi
        assert_eq!(
            DeviceTarget::parse("huawei:xiaomi:abc").provider(),
            Provider::Huawei
        );
        assert_eq!(
            DeviceTarget::parse("android_rn:fcm-token"),
            DeviceTarget::Fcm("android_rn:fcm-token".to_string())
        );
        assert_eq!(DeviceTarget::parse(""), DeviceTarget::Fcm(String::new()));
    }

    #[test]
    fn test_notification_deserialize_parses_device() {
        let notification: Notification = serde_json::from_value(json!({
            "device_id": "android_rn:huawei:TOKEN123",
            "type": "message",
            "message": "hello",
            "ack_id": "ack-1"
        }))
        .unwrap();

        assert_eq!(notification.device.provider(), Provider::Huawei);
        assert_eq!(notification.device.token(), "TOKEN123");
        assert!(notification.has_ack());
        assert_eq!(notification.badge, 0);
    }

    #[test]
    fn test_has_ack_ignores_empty() {
        let mut notification = Notification::new("abc", PushType::Clear);
        assert!(!notification.has_ack());
        notification.ack_id = Some(String::new());
        assert!(!notification.has_ack());
    }

    #[test]
    fn test_to_data_message_fields() {
        let mut notification = Notification::new("abc", PushType::Message);
        notification.message = Some("hi".to_string());
        notification.badge = 3;
        notification.from_webhook = true;

        let data = notification.to_data();
        assert_eq!(data["type"], "message");
        assert_eq!(data["badge"], 3);
        assert_eq!(data["message"], "hi");
        assert_eq!(data["from_webhook"], true);
        assert_eq!(data["ack_id"], "");
    }

    #[test]
    fn test_to_data_expands_emoji_shortcodes() {
        let mut notification = Notification::new("abc", PushType::Message);
        notification.message = Some("nice :smile:".to_string());

        let data = notification.to_data();
        assert_eq!(data["message"], "nice \u{1F604}");
        // 原始字段不变
        assert_eq!(notification.message.as_deref(), Some("nice :smile:"));
    }

    #[test]
    fn test_from_webhook_accepts_string_or_bool() {
        for (raw, expected) in [
            (json!(true), true),
            (json!("true"), true),
            (json!("TRUE"), true),
            (json!("false"), false),
            (json!(""), false),
            (json!(false), false),
        ] {
            let notification: Notification =
                serde_json::from_value(json!({"device_id": "abc", "from_webhook": raw})).unwrap();
            assert_eq!(notification.from_webhook, expected, "raw {raw}");
        }

        let notification: Notification =
            serde_json::from_value(json!({"device_id": "abc"})).unwrap();
        assert!(!notification.from_webhook);
    }

    #[test]
    fn test_display_keeps_provider_marker() {
        let target = DeviceTarget::parse("android_rn:huawei:TOKEN123");
        assert_eq!(target.to_string(), "huawei:TOKEN123");
        assert_eq!(DeviceTarget::parse(&target.to_string()), target);
    }

    #[test]
    fn test_to_data_clear_omits_message_fields() {
        let mut notification = Notification::new("abc", PushType::Clear);
        notification.message = Some("ignored".to_string());

        let data = notification.to_data();
        assert_eq!(data["type"], "clear");
        assert!(!data.contains_key("message"));
        assert!(!data.contains_key("post_id"));
        assert!(data.contains_key("channel_id"));
    }
}
