use anyhow::Result;
use clap::Parser;
use legal_lens::utils::logging;
use legal_lens::{App, Cli, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging || cli.verbose);

    // 初始化并运行应用
    App::initialize(config)?.run(&cli).await?;

    Ok(())
}
