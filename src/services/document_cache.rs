//! 文档缓存服务 - 业务能力层
//!
//! 只负责"按文档ID存取分析结果"能力，不关心流程

use tracing::{debug, warn};

use crate::error::AppResult;
use crate::infrastructure::Storage;
use crate::models::{CachedDocument, DocumentPatch, RiskRecord, PLACEHOLDER_FILENAME};

const CACHE_KEY_PREFIX: &str = "doc_cache_";
const CURRENT_DOC_KEY: &str = "current_doc_id";

/// 文档缓存
///
/// 职责：
/// - 每个文档ID最多一条 CachedDocument
/// - 局部更新只合并，不清空
/// - 记录"当前文档"
/// - 损坏的记录按不存在处理，只记日志
pub struct DocumentCache {
    storage: Box<dyn Storage>,
}

impl DocumentCache {
    /// 使用注入的存储后端创建缓存
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    fn key(doc_id: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, doc_id)
    }

    /// 读取缓存的文档
    pub fn get(&self, doc_id: &str) -> Option<CachedDocument> {
        let key = Self::key(doc_id);
        let raw = match self.storage.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("⚠️ 读取缓存失败 {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!("⚠️ 缓存记录已损坏，按未缓存处理 {}: {}", key, e);
                None
            }
        }
    }

    /// 写入整条文档，并设为当前文档
    pub fn put(&self, doc: &CachedDocument) -> AppResult<()> {
        let key = Self::key(&doc.doc_id);
        let encoded = serde_json::to_string(doc)?;
        self.storage.set(&key, &encoded)?;
        self.set_current_doc_id(&doc.doc_id)?;
        debug!("已缓存文档 {}", doc.doc_id);
        Ok(())
    }

    /// 局部更新
    ///
    /// 没有记录时新建：文件名缺省为占位名，上传时间缺省为当前时间
    pub fn patch(&self, doc_id: &str, patch: DocumentPatch) -> AppResult<()> {
        let mut doc = self
            .get(doc_id)
            .unwrap_or_else(|| CachedDocument::new(doc_id, PLACEHOLDER_FILENAME));
        doc.apply(patch);
        self.put(&doc)
    }

    /// 缓存的摘要
    pub fn summary(&self, doc_id: &str) -> Option<String> {
        self.get(doc_id)?.summary.filter(|s| !s.is_empty())
    }

    /// 缓存的风险列表
    pub fn risks(&self, doc_id: &str) -> Option<Vec<RiskRecord>> {
        self.get(doc_id)?.risks
    }

    /// 摘要和风险是否都已缓存
    pub fn is_complete(&self, doc_id: &str) -> bool {
        self.get(doc_id).is_some_and(|doc| doc.is_complete())
    }

    pub fn current_doc_id(&self) -> Option<String> {
        match self.storage.get(CURRENT_DOC_KEY) {
            Ok(id) => id.filter(|id| !id.trim().is_empty()),
            Err(e) => {
                warn!("⚠️ 读取当前文档ID失败: {}", e);
                None
            }
        }
    }

    pub fn set_current_doc_id(&self, doc_id: &str) -> AppResult<()> {
        self.storage.set(CURRENT_DOC_KEY, doc_id)
    }

    pub fn clear_current_doc_id(&self) -> AppResult<()> {
        self.storage.remove(CURRENT_DOC_KEY)
    }

    /// 清空全部缓存的文档和当前文档标记
    pub fn clear_all(&self) -> AppResult<()> {
        let keys = self.storage.keys()?;
        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(CACHE_KEY_PREFIX)) {
            self.storage.remove(key)?;
            removed += 1;
        }
        self.clear_current_doc_id()?;
        debug!("已清空 {} 条缓存文档", removed);
        Ok(())
    }
}
