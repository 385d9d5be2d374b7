use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

static SEVERITY_LEVELS: phf::Map<&'static str, Severity> = phf::phf_map! {
    "high" => Severity::High,
    "medium" => Severity::Medium,
    "low" => Severity::Low,
};

impl Severity {
    /// 规范化上游的 `severity_level`
    ///
    /// 大小写不敏感，缺失或无法识别时为 `Medium`
    pub fn normalize(level: Option<&str>) -> Self {
        level
            .map(|l| l.trim().to_lowercase())
            .and_then(|l| SEVERITY_LEVELS.get(l.as_str()).copied())
            .unwrap_or(Severity::Medium)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// 高亮时使用的视觉强度
    pub fn tier(self) -> HighlightTier {
        match self {
            Severity::High => HighlightTier::Strong,
            Severity::Medium => HighlightTier::Moderate,
            Severity::Low => HighlightTier::Subtle,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 三档高亮强度，具体样式由展示层决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HighlightTier {
    Subtle,
    Moderate,
    Strong,
}

/// 规范化后的风险记录
///
/// `highlight_start..highlight_end` 是 `page_text` 内的字符区间（左闭右开）。
/// 找不到页面信息的记录区间为 `0..0`，高亮时会被过滤掉。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub id: String,
    pub severity: Severity,
    pub severity_score: f64,
    pub title: String,
    pub explanation: String,
    pub recommendations: Vec<String>,
    pub page_number: u32,
    #[serde(default)]
    pub page_text: String,
    /// 原文片段，仅供参考
    #[serde(default)]
    pub highlight_text: String,
    pub highlight_start: usize,
    pub highlight_end: usize,
}

// ========== 上游数据结构 ==========

/// LLM 给出的风险（文字质量高，但没有页面位置）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmRisk {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub short_risk: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default, deserialize_with = "deserialize_recommendations")]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub severity_level: Option<String>,
    #[serde(default, deserialize_with = "deserialize_number")]
    pub severity_score: Option<f64>,
}

/// 服务端正则兜底提取的风险（有页面位置，文字粗糙）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerRisk {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub severity_level: Option<String>,
    #[serde(default, deserialize_with = "deserialize_number")]
    pub severity_score: Option<f64>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "deserialize_integer")]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub page_text: Option<String>,
    #[serde(default, deserialize_with = "deserialize_integer")]
    pub highlight_start: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_integer")]
    pub highlight_end: Option<i64>,
    #[serde(default)]
    pub original_text: Option<String>,
}

/// 合并后（或服务端已合并好）的上游风险，所有字段都可能缺失
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamRisk {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub severity_level: Option<String>,
    #[serde(default, deserialize_with = "deserialize_number")]
    pub severity_score: Option<f64>,
    #[serde(default)]
    pub short_risk: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default, deserialize_with = "deserialize_recommendations")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_integer")]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub page_text: Option<String>,
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default, deserialize_with = "deserialize_integer")]
    pub highlight_start: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_integer")]
    pub highlight_end: Option<i64>,
}

impl UpstreamRisk {
    /// LLM 文字 + 服务端位置
    ///
    /// 文字字段和等级以 LLM 为准；没有对应的服务端记录时位置字段全部缺失
    pub fn merge(llm: LlmRisk, server: Option<&ServerRisk>) -> Self {
        Self {
            id: llm.id,
            severity_level: llm.severity_level,
            severity_score: llm.severity_score,
            short_risk: llm.short_risk,
            explanation: llm.explanation,
            recommendations: llm.recommendations,
            label: server.and_then(|s| s.label.clone()),
            page_number: server.and_then(|s| s.page_number),
            page_text: server.and_then(|s| s.page_text.clone()),
            original_text: server.and_then(|s| {
                non_empty(s.original_text.as_deref())
                    .or(non_empty(s.snippet.as_deref()))
                    .map(str::to_string)
            }),
            snippet: server.and_then(|s| s.snippet.clone()),
            highlight_start: server.and_then(|s| s.highlight_start),
            highlight_end: server.and_then(|s| s.highlight_end),
        }
    }
}

impl From<ServerRisk> for UpstreamRisk {
    fn from(server: ServerRisk) -> Self {
        Self {
            id: server.id,
            severity_level: server.severity_level,
            severity_score: server.severity_score,
            short_risk: None,
            label: server.label,
            explanation: None,
            recommendations: Vec::new(),
            page_number: server.page_number,
            page_text: server.page_text,
            original_text: server.original_text,
            snippet: server.snippet,
            highlight_start: server.highlight_start,
            highlight_end: server.highlight_end,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

// ========== 宽松反序列化 ==========

/// id 既可能是字符串也可能是整数；空字符串视为缺失
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// 数字字段可能是数字或数字字符串；其他值视为缺失
fn lenient_number(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn deserialize_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(Option::<Value>::deserialize(deserializer)?))
}

/// 页码和偏移量，小数部分截掉
fn deserialize_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let number = lenient_number(Option::<Value>::deserialize(deserializer)?);
    Ok(number.filter(|n| n.is_finite()).map(|n| n.trunc() as i64))
}

/// 建议既可能是字符串数组，也可能是单个字符串；空白项丢弃
fn deserialize_recommendations<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
