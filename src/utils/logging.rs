/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// `RUST_LOG` 优先；否则默认 `info`，详细模式下为 `debug`。
/// 重复调用是安全的（测试中会多次调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `api_base_url`: 分析服务地址
/// - `cache_dir`: 缓存目录
pub fn log_startup(api_base_url: &str, cache_dir: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 法律文档风险分析");
    info!("🌐 分析服务: {}", api_base_url);
    info!("💾 缓存目录: {}", cache_dir);
    info!("{}", "=".repeat(60));
}

/// 记录文档处理完成信息
///
/// # 参数
/// - `doc_id`: 文档ID
/// - `summary_ready`: 摘要是否生成成功
/// - `risks_ready`: 风险分析是否成功
pub fn log_processing_complete(doc_id: &str, summary_ready: bool, risks_ready: bool) {
    info!("\n{}", "─".repeat(60));
    info!("📊 文档 {} 处理完成", doc_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{} 摘要", if summary_ready { "✅" } else { "❌" });
    info!("{} 风险分析", if risks_ready { "✅" } else { "❌" });
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
