//! 华为推送内容过滤
//!
//! 华为反垃圾策略会以 `Anti-Spam: word is forbidden in [body]` 拒绝包含特定短串的
//! payload。这里对序列化后的完整 payload 文本逐个做字面替换，不按字段处理。
//! 屏蔽词列表由厂商决定，变更时需要同时提升 [`CONTENT_FILTER_VERSION`]。

/// 屏蔽词列表版本
pub const CONTENT_FILTER_VERSION: u32 = 1;

/// 按顺序替换的屏蔽词
pub const FORBIDDEN_SUBSTRINGS: [&str; 3] = ["jb", "j8", "sm"];

/// 替换后的占位串
pub const PLACEHOLDER: &str = "__";

/// 替换序列化 payload 中所有屏蔽词
pub fn filter_content(payload: &str) -> String {
    FORBIDDEN_SUBSTRINGS
        .iter()
        .fold(payload.to_string(), |text, word| text.replace(word, PLACEHOLDER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_every_occurrence() {
        assert_eq!(filter_content("jbj8sm"), "______");
        assert_eq!(filter_content("a jb b jb c"), "a __ b __ c");
        assert_eq!(filter_content("smsmsm"), "______");
    }

    #[test]
    fn test_other_bytes_untouched() {
        let payload = r#"{"hps":{"msg":{"body":{"message":"hello 世界 J8 SM"},"type":1}}}"#;
        assert_eq!(filter_content(payload), payload);
    }

    #[test]
    fn test_applies_to_keys_and_values() {
        let payload = r#"{"smile":"jbx","k":"j8"}"#;
        assert_eq!(filter_content(payload), r#"{"__ile":"__x","k":"__"}"#);
    }

    #[test]
    fn test_length_preserved() {
        let payload = "xxjbyyj8zzsm";
        let filtered = filter_content(payload);
        assert_eq!(filtered.len(), payload.len());
        for word in FORBIDDEN_SUBSTRINGS {
            assert!(!filtered.contains(word));
        }
    }
}
