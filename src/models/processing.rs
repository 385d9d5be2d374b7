use std::fmt::Display;

/// 上传后处理流程的阶段，只会向前推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessingStep {
    Uploaded,
    Analyzing,
    Complete,
}

/// 推送给展示层的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingState {
    pub step: ProcessingStep,
    /// 0..=100，单调不减
    pub progress: u8,
    pub summary_ready: bool,
    pub risks_ready: bool,
}

impl Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:?} {:>3}% 摘要:{} 风险:{}]",
            self.step,
            self.progress,
            if self.summary_ready { "✓" } else { "…" },
            if self.risks_ready { "✓" } else { "…" }
        )
    }
}

/// 一次处理流程的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub doc_id: String,
    pub summary_ready: bool,
    pub risks_ready: bool,
    /// 视图仍然存活时，交给文档摘要页的文档ID
    pub handoff: Option<String>,
}
