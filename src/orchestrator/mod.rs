//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `processing` - 上传后处理编排
//! - 并发发起摘要和风险分析两个请求
//! - 按固定间隔推进进度，两个请求都结束后进度到 100
//! - 展示层销毁后停止推送状态
//!
//! ### `app` - 命令行应用
//! - 管理应用生命周期（初始化、运行）
//! - 上传文档、运行处理流程
//! - 输出摘要、风险分和带标记的页面文字
//!
//! ## 层次关系
//!
//! ```text
//! app (命令行入口)
//!     ↓
//! processing (单个文档的处理流程)
//!     ↓
//! services (能力层：cache / reconciler / highlight)
//!     ↓
//! clients + infrastructure (分析服务 / 存储介质)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管生命周期，processing 管单个文档
//! 2. **资源隔离**：只有编排层持有客户端和缓存
//! 3. **向下依赖**：编排层 → services → clients / infrastructure
//! 4. **无业务逻辑**：只做调度和输出，不做具体业务判断

pub mod app;
pub mod processing;

// 重新导出主要类型
pub use app::{App, Cli};
pub use processing::{Liveness, ProcessingOrchestrator, ProgressSettings};
