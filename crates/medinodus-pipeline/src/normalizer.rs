//! OCR文本清洗

use regex::Regex;
use std::sync::OnceLock;

/// 结果最少保留字符数
const MIN_TEXT_CHARS: usize = 3;

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\-=+*#_.]{3,}$").expect("separator pattern is valid"))
}

/// 清洗OCR/模型输出文本
///
/// 先对整段文本处理：去掉不可打印字符、所有空白（含换行）合并为单个空格、
/// 裁掉首尾标点；再丢弃过短或纯分隔线的结果。跨行断开的内容会被拼回一行。
/// 任意输入都不会失败，且 `normalize(normalize(x)) == normalize(x)`。
pub fn normalize(raw: &str) -> String {
    let printable: String = raw
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    let collapsed = printable.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());

    if trimmed.chars().count() < MIN_TEXT_CHARS || separator_pattern().is_match(trimmed) {
        return String::new();
    }
    trimmed.to_string()
}
