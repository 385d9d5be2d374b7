//! 命令行应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：打开缓存目录，创建分析服务客户端
//! 2. **上传与处理**：上传文档后运行 `ProcessingOrchestrator`，实时输出进度
//! 3. **结果展示**：输出摘要、风险分、风险列表和带标记的页面文字
//!
//! 不直接做任何业务判断，只调用 services 的能力。

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Parser;
use futures::future;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::clients::{AnalysisApi, AnalysisClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::FileStorage;
use crate::models::{CachedDocument, HighlightTier, RiskRecord};
use crate::orchestrator::processing::{Liveness, ProcessingOrchestrator, ProgressSettings};
use crate::services::{risk_score, DocumentCache, PageIndex, RiskService, Segment};
use crate::utils::logging::log_startup;

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "legal_lens", version, about = "上传法律文档，生成摘要并标出风险条款")]
pub struct Cli {
    /// 要上传分析的文档
    #[arg(conflicts_with = "doc")]
    pub file: Option<PathBuf>,

    /// 查看已上传文档的分析结果
    #[arg(long)]
    pub doc: Option<String>,

    /// 配置文件路径
    #[arg(long, env = "LEGAL_LENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// 运行前清空本地缓存
    #[arg(long)]
    pub clear_cache: bool,

    /// 显示详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

/// 应用主结构
pub struct App {
    config: Config,
    cache: DocumentCache,
    client: AnalysisClient,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        log_startup(&config.api_base_url, &config.cache_dir);

        let storage = FileStorage::open(&config.cache_dir)?;
        let cache = DocumentCache::new(storage);
        let client = AnalysisClient::new(&config);

        Ok(Self {
            config,
            cache,
            client,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self, cli: &Cli) -> AppResult<()> {
        if cli.clear_cache {
            self.cache.clear_all()?;
            info!("🧹 已清空本地缓存");
        }

        let doc_id = match (&cli.file, &cli.doc) {
            (Some(path), _) => self.upload_and_process(path).await?,
            (None, Some(doc_id)) => doc_id.clone(),
            (None, None) => match self.cache.current_doc_id() {
                Some(doc_id) => {
                    info!("📂 打开上次的文档 {}", doc_id);
                    doc_id
                }
                None => {
                    warn!("⚠️ 没有指定文档，也没有上次打开的文档");
                    return Ok(());
                }
            },
        };

        self.print_report(&doc_id).await
    }

    /// 上传文档并运行处理流程，返回要展示的文档ID
    async fn upload_and_process(&self, path: &Path) -> AppResult<String> {
        info!("📤 正在上传 {}", path.display());
        let uploaded = self.client.upload(path).await?;
        let filename = uploaded
            .filename
            .filter(|f| !f.trim().is_empty())
            .or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| crate::models::PLACEHOLDER_FILENAME.to_string());
        let doc_id = uploaded.doc_id;

        self.cache.put(&CachedDocument::new(&doc_id, filename))?;
        info!("✓ 上传成功，文档ID: {}", doc_id);

        let orchestrator = ProcessingOrchestrator::new(
            &self.client,
            &self.cache,
            ProgressSettings::from(&self.config),
        );
        let liveness = Liveness::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let processing = async {
            let outcome = orchestrator.run(&doc_id, &liveness, &tx).await;
            drop(tx);
            outcome
        };
        let progress = async {
            while let Some(state) = rx.recv().await {
                info!("⏳ {}", state);
            }
        };
        let (outcome, ()) = future::join(processing, progress).await;

        if !outcome.summary_ready {
            warn!("⚠️ 摘要没有生成，稍后可以用 --doc {} 重试", outcome.doc_id);
        }
        if !outcome.risks_ready {
            warn!("⚠️ 风险分析没有完成，稍后可以用 --doc {} 重试", outcome.doc_id);
        }
        Ok(outcome.handoff.unwrap_or(outcome.doc_id))
    }

    /// 输出文档的分析结果
    async fn print_report(&self, doc_id: &str) -> AppResult<()> {
        let service = RiskService::new(&self.client, &self.cache);
        let document = service.load_document(doc_id).await?;
        let risks = service.load_risks(doc_id).await;

        println!("{}", "=".repeat(60));
        println!("📄 {} ({})", document.filename, doc_id);
        println!(
            "上传时间: {}",
            document
                .uploaded_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        println!("{}", "=".repeat(60));

        match document.summary.as_deref() {
            Some(summary) => println!("\n📝 摘要\n{}", summary),
            None => println!("\n📝 摘要尚未生成"),
        }

        println!(
            "\n⚖️ 风险分: {}/100，共 {} 条风险",
            risk_score(&risks),
            risks.len()
        );
        for (idx, risk) in risks.iter().enumerate() {
            print_risk(idx + 1, risk);
        }

        let index = PageIndex::new(&risks);
        for page in index.page_numbers() {
            if index.page_text(page).is_empty() {
                continue;
            }
            println!("\n{} 第 {} 页 {}", "─".repeat(20), page, "─".repeat(20));
            println!("{}", mark_segments(&index.render_page(page)));
        }

        Ok(())
    }
}

fn print_risk(position: usize, risk: &RiskRecord) {
    println!(
        "\n{}. [{}] {} (第 {} 页, {:.0} 分)",
        position, risk.severity, risk.title, risk.page_number, risk.severity_score
    );
    println!("   {}", risk.explanation);
    for recommendation in &risk.recommendations {
        println!("   - {}", recommendation);
    }
}

/// 用文字标记表示高亮强度：强 `<<..>>`，中 `<..>`，弱 `_.._`
pub fn mark_segments(segments: &[Segment<'_>]) -> String {
    segments
        .iter()
        .map(|segment| match segment.highlight.map(|s| s.tier()) {
            None => segment.text.to_string(),
            Some(HighlightTier::Strong) => format!("<<{}>>", segment.text),
            Some(HighlightTier::Moderate) => format!("<{}>", segment.text),
            Some(HighlightTier::Subtle) => format!("_{}_", segment.text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    #[test]
    fn test_mark_segments_by_tier() {
        let segments = [
            Segment { text: "Tenant ", highlight: None },
            Segment { text: "must pay", highlight: Some(Severity::High) },
            Segment { text: " a ", highlight: None },
            Segment { text: "fee", highlight: Some(Severity::Medium) },
            Segment { text: " on ", highlight: None },
            Segment { text: "exit", highlight: Some(Severity::Low) },
        ];
        assert_eq!(
            mark_segments(&segments),
            "Tenant <<must pay>> a <fee> on _exit_"
        );
    }

    #[test]
    fn test_cli_rejects_file_and_doc_together() {
        assert!(Cli::try_parse_from(["legal_lens", "lease.pdf", "--doc", "d1"]).is_err());

        let cli = Cli::try_parse_from(["legal_lens", "--doc", "d1", "--clear-cache"]).unwrap();
        assert_eq!(cli.doc.as_deref(), Some("d1"));
        assert!(cli.clear_cache);
        assert!(cli.file.is_none());
    }
}
