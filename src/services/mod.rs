//! 业务能力层
//!
//! 每个服务只提供一种能力，不关心流程编排

pub mod document_cache;
pub mod generic_text;
pub mod highlight_mapper;
pub mod risk_reconciler;
pub mod risk_service;

pub use document_cache::DocumentCache;
pub use highlight_mapper::{HighlightMapper, HighlightSpan, PageIndex, Segment};
pub use risk_reconciler::{risk_score, RiskReconciler};
pub use risk_service::RiskService;
