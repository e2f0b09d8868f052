/// 将文本中的 `:shortcode:` 替换为对应的 emoji
///
/// 无法识别的短码原样保留。
pub fn expand_shortcodes(text: &str) -> String {
    let mut expanded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(':') {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find(':') else {
            expanded.push_str(&rest[start..]);
            return expanded;
        };

        match lookup(&after[..end]) {
            Some(emoji) => {
                expanded.push_str(emoji);
                rest = &after[end + 1..];
            }
            None => {
                // 结尾的冒号可能是下一个短码的开头
                expanded.push(':');
                rest = after;
            }
        }
    }

    expanded.push_str(rest);
    expanded
}

fn lookup(name: &str) -> Option<&'static str> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'));
    if !valid {
        return None;
    }
    emojis::get_by_shortcode(name).map(|emoji| emoji.as_str())
}
