//! 上传后处理编排 - 编排层
//!
//! ## 职责
//!
//! 文档上传成功后，同时发起摘要和风险分析两个请求：
//! - 两个请求各自成功就各自写缓存、各自置就绪标记
//! - 单个请求失败只记日志，不影响另一个
//! - 请求进行中按固定间隔推进进度，两个都结束后进度直接到 100
//! - 结束后等待一小段时间，再把文档ID交给摘要页
//!
//! 展示层被销毁后（`Liveness::unmount`），后续状态不再推送，
//! 但已经发出的请求不会被取消，结果仍然写入缓存。

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clients::AnalysisApi;
use crate::config::Config;
use crate::models::{
    now_millis, parse_timestamp, DocumentPatch, ProcessingOutcome, ProcessingState,
    ProcessingStep, RiskPayload,
};
use crate::services::{DocumentCache, RiskReconciler};
use crate::utils::logging::log_processing_complete;

/// 展示层是否仍然存活
///
/// 克隆后共享同一个标记
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 展示层销毁时调用
    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// 进度推进参数
#[derive(Debug, Clone, Copy)]
pub struct ProgressSettings {
    pub tick: Duration,
    pub step: u8,
    pub ceiling: u8,
    pub handoff_delay: Duration,
}

impl From<&Config> for ProgressSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick: Duration::from_millis(config.progress_tick_ms.max(1)),
            step: config.progress_step,
            ceiling: config.progress_ceiling.min(100),
            handoff_delay: Duration::from_millis(config.handoff_delay_ms),
        }
    }
}

/// 一次处理流程中共享的状态
struct Tracker<'a> {
    progress: AtomicU8,
    summary_ready: AtomicBool,
    risks_ready: AtomicBool,
    liveness: &'a Liveness,
    updates: &'a UnboundedSender<ProcessingState>,
}

impl<'a> Tracker<'a> {
    fn new(liveness: &'a Liveness, updates: &'a UnboundedSender<ProcessingState>) -> Self {
        Self {
            progress: AtomicU8::new(0),
            summary_ready: AtomicBool::new(false),
            risks_ready: AtomicBool::new(false),
            liveness,
            updates,
        }
    }

    fn snapshot(&self, step: ProcessingStep) -> ProcessingState {
        ProcessingState {
            step,
            progress: self.progress.load(Ordering::SeqCst),
            summary_ready: self.summary_ready.load(Ordering::SeqCst),
            risks_ready: self.risks_ready.load(Ordering::SeqCst),
        }
    }

    /// 推送状态；展示层已销毁时丢弃
    fn emit(&self, step: ProcessingStep) {
        if !self.liveness.is_alive() {
            return;
        }
        let state = self.snapshot(step);
        debug!("处理状态 {}", state);
        if self.updates.send(state).is_err() {
            debug!("状态接收端已关闭");
        }
    }

    /// 进度推进一步，不超过上限，也不会回退
    fn advance(&self, step: u8, ceiling: u8) {
        let next = self
            .progress
            .load(Ordering::SeqCst)
            .saturating_add(step)
            .min(ceiling);
        self.progress.fetch_max(next, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.progress.fetch_max(100, Ordering::SeqCst);
    }
}

/// 上传后处理编排器
pub struct ProcessingOrchestrator<'a, A: AnalysisApi> {
    api: &'a A,
    cache: &'a DocumentCache,
    settings: ProgressSettings,
}

impl<'a, A: AnalysisApi> ProcessingOrchestrator<'a, A> {
    pub fn new(api: &'a A, cache: &'a DocumentCache, settings: ProgressSettings) -> Self {
        Self {
            api,
            cache,
            settings,
        }
    }

    /// 运行处理流程
    ///
    /// # 参数
    /// - `doc_id`: 已上传的文档ID
    /// - `liveness`: 展示层存活标记
    /// - `updates`: 状态推送通道
    ///
    /// # 返回
    /// 两个请求的结果；展示层仍存活时 `handoff` 为文档ID
    pub async fn run(
        &self,
        doc_id: &str,
        liveness: &Liveness,
        updates: &UnboundedSender<ProcessingState>,
    ) -> ProcessingOutcome {
        let tracker = Tracker::new(liveness, updates);
        tracker.emit(ProcessingStep::Uploaded);

        info!("🚀 开始分析文档 {}", doc_id);
        tracker.emit(ProcessingStep::Analyzing);

        // 两个请求互不影响，全部结束才继续
        let both = future::join(
            self.generate_summary(doc_id, &tracker),
            self.analyze_risks(doc_id, &tracker),
        );
        tokio::pin!(both);

        let mut ticker = tokio::time::interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval 的第一次 tick 立即完成
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut both => break,
                _ = ticker.tick() => {
                    tracker.advance(self.settings.step, self.settings.ceiling);
                    tracker.emit(ProcessingStep::Analyzing);
                }
            }
        }

        tracker.finish();
        tracker.emit(ProcessingStep::Complete);

        let summary_ready = tracker.summary_ready.load(Ordering::SeqCst);
        let risks_ready = tracker.risks_ready.load(Ordering::SeqCst);
        log_processing_complete(doc_id, summary_ready, risks_ready);

        tokio::time::sleep(self.settings.handoff_delay).await;

        let handoff = liveness.is_alive().then(|| doc_id.to_string());
        if handoff.is_none() {
            debug!("展示层已销毁，不再跳转");
        }

        ProcessingOutcome {
            doc_id: doc_id.to_string(),
            summary_ready,
            risks_ready,
            handoff,
        }
    }

    /// 生成摘要并写入缓存
    async fn generate_summary(&self, doc_id: &str, tracker: &Tracker<'_>) {
        let summary = match self.api.summarize(doc_id).await {
            Ok(response) => response.summary.filter(|s| !s.trim().is_empty()),
            Err(e) => {
                warn!("⚠️ 生成摘要失败 {}: {}", doc_id, e);
                return;
            }
        };
        let Some(summary) = summary else {
            warn!("⚠️ 摘要为空 {}", doc_id);
            return;
        };

        if let Err(e) = self
            .cache
            .patch(doc_id, DocumentPatch::summary(summary, now_millis()))
        {
            warn!("⚠️ 缓存摘要失败 {}: {}", doc_id, e);
        }
        tracker.summary_ready.store(true, Ordering::SeqCst);
        info!("✓ 摘要已生成");
        tracker.emit(ProcessingStep::Analyzing);
    }

    /// 分析风险，合并后写入缓存
    async fn analyze_risks(&self, doc_id: &str, tracker: &Tracker<'_>) {
        let fields = match self.api.analyze_risks(doc_id).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!("⚠️ 风险分析失败 {}: {}", doc_id, e);
                return;
            }
        };

        let payload = RiskPayload::classify(&fields);
        if matches!(payload, RiskPayload::Empty) {
            warn!("⚠️ 风险分析响应中没有风险数据 {}", doc_id);
            return;
        }
        let records = RiskReconciler::reconcile(&payload);
        let generated_at = fields
            .risks_generated_at
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or_else(now_millis);
        let count = records.len();

        if let Err(e) = self
            .cache
            .patch(doc_id, DocumentPatch::risks(records, generated_at))
        {
            warn!("⚠️ 缓存风险失败 {}: {}", doc_id, e);
        }
        tracker.risks_ready.store(true, Ordering::SeqCst);
        info!("✓ 风险分析完成，共 {} 条", count);
        tracker.emit(ProcessingStep::Analyzing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, Instant};

    use crate::error::{AppError, AppResult};
    use crate::infrastructure::MemoryStorage;
    use crate::models::{DocumentResponse, RawRiskFields, SummaryResponse, UploadResponse};

    /// 按固定延迟返回结果的假服务
    struct DelayedApi {
        summary_delay: Duration,
        risks_delay: Duration,
        summary_fails: bool,
    }

    impl AnalysisApi for DelayedApi {
        async fn upload(&self, _path: &Path) -> AppResult<UploadResponse> {
            Err(AppError::Other("not supported".into()))
        }

        async fn fetch_document(&self, _doc_id: &str) -> AppResult<DocumentResponse> {
            Err(AppError::Other("not supported".into()))
        }

        async fn summarize(&self, _doc_id: &str) -> AppResult<SummaryResponse> {
            sleep(self.summary_delay).await;
            if self.summary_fails {
                return Err(AppError::api_bad_response("/summarize", 500));
            }
            Ok(SummaryResponse {
                summary: Some("A residential lease.".into()),
            })
        }

        async fn analyze_risks(&self, _doc_id: &str) -> AppResult<RawRiskFields> {
            sleep(self.risks_delay).await;
            Ok(serde_json::from_value(json!({
                "risks": [{ "id": "r1", "short_risk": "Termination", "severity_level": "high", "severity_score": 80 }]
            }))?)
        }
    }

    fn settings() -> ProgressSettings {
        ProgressSettings::from(&Config::default())
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<ProcessingState>) -> Vec<ProcessingState> {
        let mut states = Vec::new();
        while let Ok(state) = rx.try_recv() {
            states.push(state);
        }
        states
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_reaches_complete() {
        let api = DelayedApi {
            summary_delay: Duration::from_millis(1200),
            risks_delay: Duration::from_millis(3100),
            summary_fails: false,
        };
        let cache = DocumentCache::new(MemoryStorage::new());
        let orchestrator = ProcessingOrchestrator::new(&api, &cache, settings());
        let liveness = Liveness::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        let outcome = orchestrator.run("d1", &liveness, &tx).await;
        drop(tx);
        let states = drain(rx);

        // 两个请求同时进行：耗时取较慢的那个，而不是两者之和
        let busy = started.elapsed() - settings().handoff_delay;
        assert!(busy >= Duration::from_millis(3100));
        assert!(busy < Duration::from_millis(3100 + 1200));

        assert_eq!(outcome.handoff.as_deref(), Some("d1"));
        assert!(outcome.summary_ready && outcome.risks_ready);
        assert!(cache.is_complete("d1"));

        assert_eq!(states.first().map(|s| s.step), Some(ProcessingStep::Uploaded));
        let last = states.last().unwrap();
        assert_eq!(last.step, ProcessingStep::Complete);
        assert_eq!(last.progress, 100);

        for pair in states.windows(2) {
            assert!(pair[0].progress <= pair[1].progress);
            assert!(pair[0].step <= pair[1].step);
        }
        // 请求进行中进度不超过上限
        assert!(states
            .iter()
            .filter(|s| s.step != ProcessingStep::Complete)
            .all(|s| s.progress <= 95));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_summary_does_not_block_risks() {
        let api = DelayedApi {
            summary_delay: Duration::from_millis(100),
            risks_delay: Duration::from_millis(700),
            summary_fails: true,
        };
        let cache = DocumentCache::new(MemoryStorage::new());
        let orchestrator = ProcessingOrchestrator::new(&api, &cache, settings());
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = orchestrator.run("d2", &Liveness::new(), &tx).await;

        assert!(!outcome.summary_ready);
        assert!(outcome.risks_ready);
        assert_eq!(cache.summary("d2"), None);
        assert_eq!(cache.risks("d2").map(|r| r.len()), Some(1));
        assert_eq!(outcome.handoff.as_deref(), Some("d2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmounted_view_gets_no_updates_but_cache_is_written() {
        let api = DelayedApi {
            summary_delay: Duration::from_millis(3000),
            risks_delay: Duration::from_millis(3000),
            summary_fails: false,
        };
        let cache = DocumentCache::new(MemoryStorage::new());
        let orchestrator = ProcessingOrchestrator::new(&api, &cache, settings());
        let liveness = Liveness::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let guard = liveness.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1200)).await;
            guard.unmount();
        });

        let outcome = orchestrator.run("d3", &liveness, &tx).await;
        drop(tx);
        let states = drain(rx);

        assert_eq!(outcome.handoff, None);
        assert!(cache.is_complete("d3"));
        assert!(states.iter().all(|s| s.step != ProcessingStep::Complete));
        assert!(states.iter().all(|s| s.progress <= 10));
    }

    #[test]
    fn test_advance_respects_ceiling_and_never_decreases() {
        let liveness = Liveness::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let tracker = Tracker::new(&liveness, &tx);

        for _ in 0..50 {
            tracker.advance(5, 95);
        }
        assert_eq!(tracker.progress.load(Ordering::SeqCst), 95);

        tracker.finish();
        tracker.advance(5, 95);
        assert_eq!(tracker.progress.load(Ordering::SeqCst), 100);
    }
}
