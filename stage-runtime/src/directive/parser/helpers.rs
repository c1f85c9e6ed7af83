//! # 辅助解析函数
//!
//! 手写的字符串解析辅助函数，无正则依赖。

use crate::error::DirectiveError;

/// 检查字符串是否以指定前缀开头（大小写不敏感）
pub fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.chars()
            .zip(prefix.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b))
}

/// 大小写不敏感地查找子串，返回字节偏移
///
/// 仅对 ASCII 折叠大小写，因此偏移与原串一致。
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// 字节偏移所在的行号（从 1 开始）
pub fn line_at(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// 去掉首尾成对的引号
///
/// 输入: `"Bad Poison"`
/// 输出: `Bad Poison`
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2
            && let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

/// 布尔值：只有 `true`（大小写不敏感）与 `1` 为真
pub fn parse_bool(s: &str) -> bool {
    let s = s.trim();
    s.eq_ignore_ascii_case("true") || s == "1"
}

/// 解析整数
pub fn parse_int(s: &str, line: usize, param: &str) -> Result<i64, DirectiveError> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| DirectiveError::InvalidParameter {
            line,
            param: param.to_string(),
            message: format!("'{}' 不是整数", s.trim()),
        })
}

/// 解析 1-based 位置
pub fn parse_position(s: &str, line: usize, param: &str) -> Result<usize, DirectiveError> {
    let value = s
        .trim()
        .parse::<usize>()
        .map_err(|_| DirectiveError::InvalidParameter {
            line,
            param: param.to_string(),
            message: format!("'{}' 不是位置", s.trim()),
        })?;
    if value == 0 {
        return Err(DirectiveError::InvalidParameter {
            line,
            param: param.to_string(),
            message: "位置从 1 开始".to_string(),
        });
    }
    Ok(value)
}

/// 去掉开头的 `sep`（允许前置空白）
pub fn expect_separator<'a>(
    body: &'a str,
    sep: char,
    line: usize,
    directive: &str,
) -> Result<&'a str, DirectiveError> {
    body.trim_start()
        .strip_prefix(sep)
        .ok_or_else(|| DirectiveError::InvalidTag {
            line,
            message: format!("'{}' 后缺少 '{}'", directive, sep),
        })
}

/// 若 `token` 以 `label` 开头（后接 `:` 或空白），返回其后的值
///
/// 输入: (`Copy: 1`, `copy`)
/// 输出: `Some("1")`
pub fn strip_label<'a>(token: &'a str, label: &str) -> Option<&'a str> {
    if !starts_with_ignore_case(token, label) {
        return None;
    }
    let rest = &token[label.len()..];
    match rest.chars().next() {
        Some(':') => Some(rest[1..].trim()),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        None => Some(""),
        _ => None,
    }
}

/// 去掉备注中的指定区间，并清理空行
pub fn strip_spans(text: &str, spans: &[std::ops::Range<usize>]) -> String {
    let mut kept = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            kept.push_str(&text[cursor..span.start]);
        }
        cursor = cursor.max(span.end);
    }
    kept.push_str(&text[cursor.min(text.len())..]);

    kept.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
