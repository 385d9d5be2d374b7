use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::risk::RiskRecord;

/// 新建缓存条目时缺省的文件名
pub const PLACEHOLDER_FILENAME: &str = "Document";

/// 当前时间，截断到毫秒
///
/// 缓存只保存毫秒精度，写入前截断才能保证读回的值与写入的相同
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// 本地缓存的文档快照
///
/// 时间戳按毫秒时间戳存储
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub doc_id: String,
    pub filename: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary_generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<RiskRecord>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub risks_generated_at: Option<DateTime<Utc>>,
}

impl CachedDocument {
    /// 刚上传完成的文档，还没有摘要和风险
    pub fn new(doc_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            filename: filename.into(),
            uploaded_at: now_millis(),
            summary: None,
            summary_generated_at: None,
            risks: None,
            risks_generated_at: None,
        }
    }

    /// 摘要和风险都已就绪
    pub fn is_complete(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.is_empty()) && self.risks.is_some()
    }

    /// 把局部更新合并到当前快照上，补丁中没有的字段保持不变
    pub fn apply(&mut self, patch: DocumentPatch) {
        if let Some(filename) = patch.filename {
            self.filename = filename;
        }
        if let Some(uploaded_at) = patch.uploaded_at {
            self.uploaded_at = uploaded_at;
        }
        if let Some(summary) = patch.summary {
            self.summary = Some(summary);
        }
        if let Some(at) = patch.summary_generated_at {
            self.summary_generated_at = Some(at);
        }
        if let Some(risks) = patch.risks {
            self.risks = Some(risks);
        }
        if let Some(at) = patch.risks_generated_at {
            self.risks_generated_at = Some(at);
        }
    }
}

/// 对 CachedDocument 的局部更新
///
/// 只能写入字段，不能清空字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub filename: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub summary_generated_at: Option<DateTime<Utc>>,
    pub risks: Option<Vec<RiskRecord>>,
    pub risks_generated_at: Option<DateTime<Utc>>,
}

impl DocumentPatch {
    /// 摘要生成结果
    pub fn summary(summary: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            summary: Some(summary.into()),
            summary_generated_at: Some(generated_at),
            ..Default::default()
        }
    }

    /// 风险分析结果
    pub fn risks(risks: Vec<RiskRecord>, generated_at: DateTime<Utc>) -> Self {
        Self {
            risks: Some(risks),
            risks_generated_at: Some(generated_at),
            ..Default::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// 解析服务端返回的时间戳
///
/// 兼容数字（秒或毫秒）和 RFC 3339 / 无时区 ISO 字符串，无法识别时返回 `None`
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            // 1e12 毫秒是 2001 年，任何真实的秒级时间戳都小于它
            let millis = if raw.abs() >= 1e12 { raw } else { raw * 1000.0 };
            Utc.timestamp_millis_opt(millis.round() as i64).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
            .map(|dt| dt.trunc_subsecs(3)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_preserves_unmentioned_fields() {
        let mut doc = CachedDocument::new("d1", "lease.pdf");
        doc.apply(DocumentPatch::summary("A lease.", Utc::now()));
        doc.apply(DocumentPatch::risks(Vec::new(), Utc::now()));

        assert_eq!(doc.filename, "lease.pdf");
        assert_eq!(doc.summary.as_deref(), Some("A lease."));
        assert!(doc.is_complete());
    }

    #[test]
    fn test_serialized_layout_uses_millisecond_numbers() {
        let mut doc = CachedDocument::new("d1", "lease.pdf");
        doc.uploaded_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["uploaded_at"], json!(1_700_000_000_123i64));
        assert!(value.get("summary").is_none());
    }

    #[test]
    fn test_stored_document_reads_back_unchanged() {
        let mut doc = CachedDocument::new("d1", "lease.pdf");
        doc.apply(DocumentPatch::summary("A lease.", now_millis()));

        let stored = serde_json::to_string(&doc).unwrap();
        let restored: CachedDocument = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, doc);
        assert_eq!(doc.uploaded_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_parse_timestamp_drops_sub_millisecond_digits() {
        let at = parse_timestamp(&json!("2024-03-01T12:00:00.123456789Z")).unwrap();
        assert_eq!(at.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let secs = parse_timestamp(&json!(1_700_000_000)).unwrap();
        let millis = parse_timestamp(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(secs, millis);

        let iso = parse_timestamp(&json!("2024-03-01T12:00:00Z")).unwrap();
        let naive = parse_timestamp(&json!("2024-03-01T12:00:00.000")).unwrap();
        assert_eq!(iso, naive);

        assert_eq!(parse_timestamp(&json!(null)), None);
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
    }
}
