//! 指令模板渲染
//!
//! 模板使用 `{name}` 形式的具名占位符，例如 `G0 X{x} Y{y} F{speed}`。
//! 未闭合的 `{` 按字面量输出；`{{` 输出单个 `{`。

use crate::ProtocolError;

/// 数值格式化时保留的小数位数
pub const VALUE_PRECISION: usize = 4;

/// 渲染模板
///
/// `lookup` 返回占位符的替换文本；返回 `None` 表示占位符未知。
pub fn render<F>(template: &str, mut lookup: F) -> Result<String, ProtocolError>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        if let Some(stripped) = after.strip_prefix('{') {
            out.push('{');
            rest = stripped;
            continue;
        }

        match after.find('}') {
            Some(end) if is_placeholder_name(&after[..end]) => {
                let name = &after[..end];
                let value = lookup(name).ok_or_else(|| ProtocolError::UnknownPlaceholder {
                    template: template.to_string(),
                    name: name.to_string(),
                })?;
                out.push_str(&value);
                rest = &after[end + 1..];
            },
            _ => {
                out.push('{');
                rest = after;
            },
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// 列出模板中出现的占位符名称（按出现顺序，可能重复）
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let _ = render(template, |name| {
        names.push(name.to_string());
        Some(String::new())
    });
    names
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 将数值格式化为指令文本
///
/// 保留最多 [`VALUE_PRECISION`] 位小数并去掉末尾的 0，`-0` 输出为 `0`。
pub fn format_value(value: f64) -> String {
    let mut text = format!("{:.*}", VALUE_PRECISION, value);
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_lookup(name: &str) -> Option<String> {
        match name {
            "x" => Some("10".to_string()),
            "y" => Some("20.5".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_render_basic() {
        let text = render("G0 X{x} Y{y}", xy_lookup).unwrap();
        assert_eq!(text, "G0 X10 Y20.5");
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let text = render("{x},{x}", xy_lookup).unwrap();
        assert_eq!(text, "10,10");
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let err = render("G0 X{x} F{speed}", xy_lookup).unwrap_err();
        match err {
            ProtocolError::UnknownPlaceholder { name, .. } => assert_eq!(name, "speed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_literal_braces() {
        assert_eq!(render("a{{b", xy_lookup).unwrap(), "a{b");
        assert_eq!(render("open { brace", xy_lookup).unwrap(), "open { brace");
        assert_eq!(render("{ x }", xy_lookup).unwrap(), "{ x }");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("G0 X{x} Y{y} F{speed}"),
            vec!["x".to_string(), "y".to_string(), "speed".to_string()]
        );
        assert!(placeholders("M114").is_empty());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(100.0), "100");
        assert_eq!(format_value(12.5), "12.5");
        assert_eq!(format_value(-3.25), "-3.25");
        assert_eq!(format_value(0.1 + 0.2), "0.3");
        assert_eq!(format_value(-0.00001), "0");
    }
}
