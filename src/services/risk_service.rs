//! 风险加载服务 - 业务能力层
//!
//! 缓存优先：缓存里有就直接用，没有再向分析服务请求，
//! 合并后写回缓存。远端失败只记日志。

use tracing::{debug, info, warn};

use crate::clients::AnalysisApi;
use crate::error::AppResult;
use crate::models::{
    now_millis, parse_timestamp, CachedDocument, DocumentPatch, RiskPayload, RiskRecord,
    PLACEHOLDER_FILENAME,
};
use crate::services::{DocumentCache, RiskReconciler};

/// 风险加载服务
pub struct RiskService<'a, A: AnalysisApi> {
    api: &'a A,
    cache: &'a DocumentCache,
}

impl<'a, A: AnalysisApi> RiskService<'a, A> {
    pub fn new(api: &'a A, cache: &'a DocumentCache) -> Self {
        Self { api, cache }
    }

    /// 加载文档的规范风险列表
    ///
    /// # 返回
    /// 缓存中非空的风险列表直接返回；否则请求文档并合并。
    /// 请求失败时返回空列表。
    pub async fn load_risks(&self, doc_id: &str) -> Vec<RiskRecord> {
        if let Some(cached) = self.cache.risks(doc_id).filter(|r| !r.is_empty()) {
            debug!("使用缓存的风险 {} 条", cached.len());
            return cached;
        }

        let document = match self.api.fetch_document(doc_id).await {
            Ok(document) => document,
            Err(e) => {
                warn!("⚠️ 获取文档 {} 的风险失败: {}", doc_id, e);
                return Vec::new();
            }
        };

        let payload = RiskPayload::classify(&document.risk_fields);
        if matches!(payload, RiskPayload::Empty) {
            info!("文档 {} 还没有风险分析结果", doc_id);
            return Vec::new();
        }

        let records = RiskReconciler::reconcile(&payload);
        let generated_at = document
            .risk_fields
            .risks_generated_at
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or_else(now_millis);

        if let Err(e) = self
            .cache
            .patch(doc_id, DocumentPatch::risks(records.clone(), generated_at))
        {
            warn!("⚠️ 缓存风险失败 {}: {}", doc_id, e);
        }
        info!("✓ 文档 {} 加载风险 {} 条", doc_id, records.len());
        records
    }

    /// 加载文档的文件名和摘要
    ///
    /// 缓存中已有摘要或风险时不请求远端
    pub async fn load_document(&self, doc_id: &str) -> AppResult<CachedDocument> {
        if let Some(cached) = self
            .cache
            .get(doc_id)
            .filter(|doc| doc.summary.is_some() || doc.risks.is_some())
        {
            debug!("使用缓存的文档 {}", doc_id);
            return Ok(cached);
        }

        let document = self.api.fetch_document(doc_id).await?;

        let mut patch = DocumentPatch::default();
        if let Some(filename) = document.filename.filter(|f| !f.trim().is_empty()) {
            patch.filename = Some(filename);
        }
        if let Some(summary) = document.summary.filter(|s| !s.trim().is_empty()) {
            let generated_at = document
                .summary_generated_at
                .as_ref()
                .and_then(parse_timestamp)
                .unwrap_or_else(now_millis);
            patch = DocumentPatch {
                filename: patch.filename,
                ..DocumentPatch::summary(summary, generated_at)
            };
        }

        if let Err(e) = self.cache.patch(doc_id, patch.clone()) {
            warn!("⚠️ 缓存文档失败 {}: {}", doc_id, e);
        }

        Ok(self.cache.get(doc_id).unwrap_or_else(|| {
            let mut doc = CachedDocument::new(doc_id, PLACEHOLDER_FILENAME);
            doc.apply(patch);
            doc
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::error::AppError;
    use crate::infrastructure::MemoryStorage;
    use crate::models::{DocumentResponse, RawRiskFields, SummaryResponse, UploadResponse};

    /// 只实现 `fetch_document` 的假服务
    struct FakeApi {
        document: Option<serde_json::Value>,
        fetches: AtomicUsize,
    }

    impl FakeApi {
        fn new(document: Option<serde_json::Value>) -> Self {
            Self {
                document,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl AnalysisApi for FakeApi {
        async fn upload(&self, _path: &Path) -> AppResult<UploadResponse> {
            Err(AppError::Other("not supported".into()))
        }

        async fn fetch_document(&self, _doc_id: &str) -> AppResult<DocumentResponse> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &self.document {
                Some(value) => Ok(serde_json::from_value(value.clone())?),
                None => Err(AppError::api_bad_response("/document", 500)),
            }
        }

        async fn summarize(&self, _doc_id: &str) -> AppResult<SummaryResponse> {
            Err(AppError::Other("not supported".into()))
        }

        async fn analyze_risks(&self, _doc_id: &str) -> AppResult<RawRiskFields> {
            Err(AppError::Other("not supported".into()))
        }
    }

    #[tokio::test]
    async fn test_load_risks_fetches_reconciles_and_caches() {
        let api = FakeApi::new(Some(json!({
            "filename": "lease.pdf",
            "risks": [{ "id": "r1", "short_risk": "Late Payment Penalty", "severity_level": "high", "page_number": 2 }],
            "risks_generated_at": 1_700_000_000
        })));
        let cache = DocumentCache::new(MemoryStorage::new());
        let service = RiskService::new(&api, &cache);

        let risks = service.load_risks("d1").await;
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].page_number, 2);

        let cached = cache.get("d1").unwrap();
        assert_eq!(cached.risks.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            cached.risks_generated_at.map(|at| at.timestamp()),
            Some(1_700_000_000)
        );

        // 第二次走缓存
        let again = service.load_risks("d1").await;
        assert_eq!(again, risks);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_risks_failure_is_empty() {
        let api = FakeApi::new(None);
        let cache = DocumentCache::new(MemoryStorage::new());
        let service = RiskService::new(&api, &cache);

        assert!(service.load_risks("d1").await.is_empty());
        assert_eq!(cache.get("d1"), None);
    }

    #[tokio::test]
    async fn test_load_document_caches_summary() {
        let api = FakeApi::new(Some(json!({
            "filename": "nda.pdf",
            "summary": "Mutual NDA for two years.",
            "summary_generated_at": "2024-03-01T12:00:00Z"
        })));
        let cache = DocumentCache::new(MemoryStorage::new());
        let service = RiskService::new(&api, &cache);

        let doc = service.load_document("d2").await.unwrap();
        assert_eq!(doc.filename, "nda.pdf");
        assert_eq!(doc.summary.as_deref(), Some("Mutual NDA for two years."));

        service.load_document("d2").await.unwrap();
        assert_eq!(api.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_document_propagates_fetch_error() {
        let api = FakeApi::new(None);
        let cache = DocumentCache::new(MemoryStorage::new());
        let service = RiskService::new(&api, &cache);

        assert!(service.load_document("d3").await.is_err());
    }
}
