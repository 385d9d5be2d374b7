pub mod document;
pub mod payload;
pub mod processing;
pub mod risk;

pub use document::{now_millis, parse_timestamp, CachedDocument, DocumentPatch, PLACEHOLDER_FILENAME};
pub use payload::{DocumentResponse, RawRiskFields, RiskPayload, SummaryResponse, UploadResponse};
pub use processing::{ProcessingOutcome, ProcessingState, ProcessingStep};
pub use risk::{HighlightTier, LlmRisk, RiskRecord, ServerRisk, Severity, UpstreamRisk};
