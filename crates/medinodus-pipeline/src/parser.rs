//! 模型输出的容错解析
//!
//! 取第一个 `{` 到最后一个 `}` 之间的片段做严格JSON解码，缺字段即视为失败。
//! 失败时返回哨兵结构和截断后的原始输出，不会panic也不会返回错误。

use medinodus_core::utils::truncate_chars;
use medinodus_core::ResultShape;
use tracing::debug;

/// 失败时保留的原始输出最大字符数
pub const RAW_OUTPUT_LIMIT: usize = 1000;

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Structured(T),
    Fallback { value: T, raw_output: String },
}

impl<T> ParseOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            ParseOutcome::Structured(value) => value,
            ParseOutcome::Fallback { value, .. } => value,
        }
    }

    /// 拆成 `(值, 是否退化)`
    pub fn into_parts(self) -> (T, bool) {
        match self {
            ParseOutcome::Structured(value) => (value, false),
            ParseOutcome::Fallback { value, .. } => (value, true),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Structured(value) => ParseOutcome::Structured(f(value)),
            ParseOutcome::Fallback { value, raw_output } => ParseOutcome::Fallback {
                value: f(value),
                raw_output,
            },
        }
    }
}

/// 定位JSON片段
fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// 把模型输出解析为期望结构
pub fn parse<T: ResultShape>(raw: &str) -> ParseOutcome<T> {
    let decoded = json_span(raw)
        .ok_or_else(|| "no JSON object found".to_string())
        .and_then(|span| serde_json::from_str::<T>(span).map_err(|e| e.to_string()));

    match decoded {
        Ok(value) => ParseOutcome::Structured(value),
        Err(reason) => {
            debug!("Model output not parseable: {}", reason);
            ParseOutcome::Fallback {
                value: T::unknown(),
                raw_output: truncate_chars(raw, RAW_OUTPUT_LIMIT),
            }
        }
    }
}
