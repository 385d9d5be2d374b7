//! 风险数据合并服务 - 业务能力层
//!
//! 把服务端返回的两种风险形态整理成一份去重、规范化的 `RiskRecord` 列表：
//! - 兜底形态：解析 LLM 原始输出，再按 id 合并服务端的页面位置
//! - 标准形态：直接规范化
//!
//! 这里所有函数都是纯函数，不做 IO；解析失败只记日志，不返回错误。

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{LlmRisk, RiskPayload, RiskRecord, ServerRisk, Severity, UpstreamRisk};
use crate::services::generic_text::{
    fallback_explanation, fallback_recommendations, is_generic_explanation,
    is_generic_recommendation,
};
use crate::utils::truncate_text;

/// 服务端标签里多个关键词之间的分隔符
const LABEL_SEPARATOR: &str = " ; ";

/// 风险合并器
pub struct RiskReconciler;

impl RiskReconciler {
    /// 把分类后的风险数据整理成规范记录
    ///
    /// # 返回
    /// 按上游顺序排列、id 唯一的记录；没有 id 的记录会被丢弃
    pub fn reconcile(payload: &RiskPayload) -> Vec<RiskRecord> {
        let upstream = match payload {
            RiskPayload::Fallback {
                raw_llm,
                server_risks,
            } => Self::merge_fallback(raw_llm, server_risks),
            RiskPayload::Standard { risks } => risks.clone(),
            RiskPayload::Empty => Vec::new(),
        };

        let records: Vec<RiskRecord> = dedupe_by_id(upstream)
            .into_iter()
            .enumerate()
            .map(|(idx, (id, risk))| canonicalize(idx + 1, id, risk))
            .collect();

        debug!("风险合并完成，共 {} 条", records.len());
        records
    }

    /// 兜底形态：LLM 文字 + 服务端位置
    ///
    /// LLM 输出无法解析时直接使用服务端的风险
    fn merge_fallback(raw_llm: &str, server_risks: &[ServerRisk]) -> Vec<UpstreamRisk> {
        let Some(llm_risks) = parse_llm_risks(raw_llm) else {
            return server_risks.iter().cloned().map(UpstreamRisk::from).collect();
        };

        let mut lookup: HashMap<&str, &ServerRisk> = HashMap::new();
        for server in server_risks {
            if let Some(id) = server.id.as_deref() {
                lookup.entry(id).or_insert(server);
            }
        }

        let merged: Vec<UpstreamRisk> = llm_risks
            .into_iter()
            .map(|llm| {
                let server = llm.id.as_deref().and_then(|id| lookup.get(id).copied());
                if server.is_none() {
                    debug!("LLM 风险 {:?} 没有对应的服务端记录，使用默认页面信息", llm.id);
                }
                UpstreamRisk::merge(llm, server)
            })
            .collect();

        debug!(
            "兜底合并: LLM {} 条, 服务端 {} 条",
            merged.len(),
            server_risks.len()
        );
        merged
    }
}

/// 去掉 Markdown 代码块围栏（```json ... ```）
///
/// 开头和结尾的围栏分别处理，任意一个缺失都可以
pub fn strip_code_fences(raw: &str) -> &str {
    let mut body = raw.trim();
    // 开头围栏可能带语言标记
    if let Ok(opening) = Regex::new(r"^```[A-Za-z]*") {
        if let Some(m) = opening.find(body) {
            body = body[m.end()..].trim_start();
        }
    }
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// 解析 LLM 原始输出为风险数组
///
/// 不是 JSON 数组时返回 `None`；数组中单条无法解析的记录会被丢弃
pub fn parse_llm_risks(raw: &str) -> Option<Vec<LlmRisk>> {
    let body = strip_code_fences(raw);
    let items = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            warn!("⚠️ LLM 风险输出不是数组（{}），改用服务端结果", json_kind(&other));
            return None;
        }
        Err(e) => {
            warn!(
                "⚠️ 解析 LLM 风险输出失败，改用服务端结果: {} | 原文: {}",
                e,
                truncate_text(body, 80)
            );
            return None;
        }
    };

    Some(
        items
            .into_iter()
            .enumerate()
            .filter_map(|(idx, item)| match serde_json::from_value::<LlmRisk>(item) {
                Ok(risk) => Some(risk),
                Err(e) => {
                    warn!("⚠️ 丢弃无法解析的 LLM 风险 [{}]: {}", idx, e);
                    None
                }
            })
            .collect(),
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 按 id 去重，保留第一次出现的记录
fn dedupe_by_id(risks: Vec<UpstreamRisk>) -> Vec<(String, UpstreamRisk)> {
    let mut seen = HashSet::new();
    risks
        .into_iter()
        .filter_map(|risk| {
            let id = risk.id.clone()?;
            seen.insert(id.clone()).then_some((id, risk))
        })
        .collect()
}

/// 服务端标签可能是 "Termination ; Termination ; Notice"，去掉重复项
pub fn clean_label(label: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in label.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        if !parts.iter().any(|seen| seen.eq_ignore_ascii_case(part)) {
            parts.push(part);
        }
    }
    (!parts.is_empty()).then(|| parts.join(LABEL_SEPARATOR))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 把一条上游风险转换成规范记录
///
/// `position` 从 1 开始，用于生成缺省标题
fn canonicalize(position: usize, id: String, risk: UpstreamRisk) -> RiskRecord {
    let title = non_blank(risk.short_risk.as_deref())
        .map(str::to_string)
        .or_else(|| risk.label.as_deref().and_then(clean_label))
        .unwrap_or_else(|| format!("Risk {}", position));

    let snippet = non_blank(risk.original_text.as_deref())
        .or(non_blank(risk.snippet.as_deref()))
        .unwrap_or_default()
        .to_string();

    let mut recommendations: Vec<String> = risk
        .recommendations
        .into_iter()
        .filter(|r| !is_generic_recommendation(r))
        .collect();
    if recommendations.is_empty() {
        recommendations = fallback_recommendations(&title);
    }

    let explanation = match risk.explanation.as_deref().map(str::trim) {
        Some(text) if !is_generic_explanation(text) => text.to_string(),
        _ => fallback_explanation(&title, &snippet),
    };

    let page_number = risk
        .page_number
        .filter(|&n| n >= 1)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(1);

    let (highlight_start, highlight_end) = match (risk.highlight_start, risk.highlight_end) {
        (Some(start), Some(end)) if start >= 0 && end >= 0 => (start as usize, end as usize),
        _ => (0, 0),
    };

    RiskRecord {
        id,
        severity: Severity::normalize(risk.severity_level.as_deref()),
        severity_score: risk
            .severity_score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 100.0))
            .unwrap_or(0.0),
        title,
        explanation,
        recommendations,
        page_number,
        page_text: risk.page_text.unwrap_or_default(),
        highlight_text: snippet,
        highlight_start,
        highlight_end,
    }
}

/// 文档整体风险分
///
/// 各条 `severity_score` 的平均值，四舍五入并限制在 0..=100；空列表为 0
pub fn risk_score(records: &[RiskRecord]) -> u8 {
    if records.is_empty() {
        return 0;
    }
    let total: f64 = records.iter().map(|r| r.severity_score).sum();
    let mean = total / records.len() as f64;
    mean.round().clamp(0.0, 100.0) as u8
}
