//! 分析服务响应的数据结构
//!
//! 风险数据的两种形态在这里一次性分类成 `RiskPayload`，
//! 后面的合并逻辑只做穷尽匹配，不再检查字段是否存在。

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::models::risk::{ServerRisk, UpstreamRisk};

/// 响应中与风险相关的原始字段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRiskFields {
    #[serde(default)]
    pub risks_fallback: Option<Value>,
    #[serde(default)]
    pub risks_raw_llm: Option<String>,
    #[serde(default)]
    pub risks: Option<Value>,
    #[serde(default)]
    pub server_risks: Option<Value>,
    #[serde(default)]
    pub risks_generated_at: Option<Value>,
}

/// `GET /document/{doc_id}` 的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentResponse {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub summary_generated_at: Option<Value>,
    #[serde(flatten)]
    pub risk_fields: RawRiskFields,
}

/// `POST /summarize` 的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub summary: Option<String>,
}

/// `POST /upload` 的响应
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub doc_id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// 分类后的风险数据
#[derive(Debug, Clone)]
pub enum RiskPayload {
    /// 服务端没能解析 LLM 的结构化输出：原始文本 + 正则兜底结果
    Fallback {
        raw_llm: String,
        server_risks: Vec<ServerRisk>,
    },
    /// 已经合并好的风险列表
    Standard { risks: Vec<UpstreamRisk> },
    /// 没有可用的风险数据
    Empty,
}

impl RiskPayload {
    /// 根据原始字段判定形态
    ///
    /// 兜底形态要求：`risks_fallback == true`、`risks_raw_llm` 非空、`risks` 是数组。
    /// 否则 `risks`（其次 `server_risks`）是数组就按标准形态处理。
    pub fn classify(fields: &RawRiskFields) -> Self {
        let flagged = matches!(fields.risks_fallback, Some(Value::Bool(true)));
        let raw_llm = fields
            .risks_raw_llm
            .as_deref()
            .filter(|raw| !raw.trim().is_empty());
        let risks = fields.risks.as_ref().and_then(Value::as_array);

        if let (true, Some(raw), Some(items)) = (flagged, raw_llm, risks) {
            return RiskPayload::Fallback {
                raw_llm: raw.to_string(),
                server_risks: decode_items(items, "risks"),
            };
        }

        if let Some(items) = risks {
            return RiskPayload::Standard {
                risks: decode_items(items, "risks"),
            };
        }

        if let Some(items) = fields.server_risks.as_ref().and_then(Value::as_array) {
            return RiskPayload::Standard {
                risks: decode_items(items, "server_risks"),
            };
        }

        RiskPayload::Empty
    }
}

/// 逐条解码，单条损坏只丢弃这一条
fn decode_items<T: serde::de::DeserializeOwned>(items: &[Value], field: &str) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value(item.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("⚠️ 丢弃无法解析的 {}[{}]: {}", field, idx, e);
                None
            }
        })
        .collect()
}
