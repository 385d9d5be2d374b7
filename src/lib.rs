//! # Legal Lens
//!
//! 法律文档分析的风险数据核心：缓存分析结果、合并风险数据、映射高亮区间
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有存储介质，只暴露按键读写能力
//! - `MemoryStorage` / `FileStorage` - 测试用内存存储 / 生产用文件存储
//! - `clients/` - 远端分析服务的 HTTP 客户端（`AnalysisApi`）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `DocumentCache` - 按文档ID存取分析结果
//! - `RiskReconciler` - 两种风险形态 → 规范风险记录
//! - `generic_text` - 套话识别与按类别补全文案
//! - `HighlightMapper` - 风险区间 → 互不重叠的高亮片段
//! - `RiskService` - 缓存优先的风险加载
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/processing` - 上传后的摘要/风险并发处理和进度推送
//! - `orchestrator/app` - 命令行应用
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{AnalysisApi, AnalysisClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{FileStorage, MemoryStorage, Storage};
pub use models::{CachedDocument, DocumentPatch, RiskPayload, RiskRecord, Severity};
pub use orchestrator::{App, Cli, Liveness, ProcessingOrchestrator};
pub use services::{DocumentCache, HighlightMapper, RiskReconciler, RiskService};
