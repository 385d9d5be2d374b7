//! 分析服务 API 客户端
//!
//! 封装所有与远端分析服务的 HTTP 调用，只负责请求和解码，
//! 不做重试，不关心缓存。

use std::future::Future;
use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::{DocumentResponse, RawRiskFields, SummaryResponse, UploadResponse};
use crate::utils::truncate_text;

/// 分析服务的能力接口
///
/// 编排层只依赖这个 trait，测试中可以替换成假的实现
pub trait AnalysisApi: Send + Sync {
    /// 上传文档，返回服务端分配的文档ID
    fn upload(&self, path: &Path) -> impl Future<Output = AppResult<UploadResponse>> + Send;

    /// 获取文档的完整分析结果
    fn fetch_document(
        &self,
        doc_id: &str,
    ) -> impl Future<Output = AppResult<DocumentResponse>> + Send;

    /// 触发摘要生成
    fn summarize(&self, doc_id: &str) -> impl Future<Output = AppResult<SummaryResponse>> + Send;

    /// 触发风险分析，返回原始风险字段
    fn analyze_risks(&self, doc_id: &str)
        -> impl Future<Output = AppResult<RawRiskFields>> + Send;
}

/// 基于 reqwest 的分析服务客户端
pub struct AnalysisClient {
    client: Client,
    base_url: String,
}

impl AnalysisClient {
    /// 创建新的分析服务客户端
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.api_base_url)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// 发送 JSON POST 请求并解码响应
    ///
    /// # 参数
    /// - `endpoint`: 接口路径，如 `/summarize`
    /// - `doc_id`: 文档ID，作为请求体 `{"doc_id": ...}`
    async fn post_doc<T: DeserializeOwned>(&self, endpoint: &str, doc_id: &str) -> AppResult<T> {
        debug!("POST {} doc_id={}", endpoint, doc_id);
        let response = self
            .client
            .post(self.url(endpoint))
            .json(&json!({ "doc_id": doc_id }))
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        Self::decode(endpoint, response).await
    }

    /// 检查状态码并解码响应体
    async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::api_bad_response(endpoint, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        debug!("{} 响应: {}", endpoint, truncate_text(&body, 200));

        serde_json::from_str(&body).map_err(|e| AppError::api_parse_failed(endpoint, e))
    }
}

impl AnalysisApi for AnalysisClient {
    async fn upload(&self, path: &Path) -> AppResult<UploadResponse> {
        let endpoint = "/upload";
        let bytes = tokio::fs::read(path).await.map_err(|source| {
            AppError::Api(ApiError::UploadFileUnreadable {
                path: path.display().to_string(),
                source,
            })
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        debug!("上传文件 {} ({} 字节)", filename, bytes.len());
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename));
        let response = self
            .client
            .post(self.url(endpoint))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        Self::decode(endpoint, response).await
    }

    async fn fetch_document(&self, doc_id: &str) -> AppResult<DocumentResponse> {
        let endpoint = format!("/document/{}", doc_id);
        debug!("GET {}", endpoint);
        let response = self
            .client
            .get(self.url(&endpoint))
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.as_str(), e))?;
        Self::decode(&endpoint, response).await
    }

    async fn summarize(&self, doc_id: &str) -> AppResult<SummaryResponse> {
        self.post_doc("/summarize", doc_id).await
    }

    async fn analyze_risks(&self, doc_id: &str) -> AppResult<RawRiskFields> {
        self.post_doc("/risks", doc_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = AnalysisClient::with_base_url("http://localhost:8000/");
        assert_eq!(client.url("/risks"), "http://localhost:8000/risks");
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_reported() {
        let client = AnalysisClient::with_base_url("http://localhost:8000");
        let err = client
            .upload(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Api(ApiError::UploadFileUnreadable { .. })
        ));
    }

    #[tokio::test]
    #[ignore] // 默认忽略，需要本地运行分析服务：cargo test -- --ignored
    async fn test_unknown_document_is_rejected_live() {
        let config = Config::from_env();
        let client = AnalysisClient::new(&config);
        let result = client.fetch_document("no-such-document").await;
        assert!(result.is_err(), "不存在的文档应该返回错误");
    }
}
