use anyhow::Result;
use loudoun_pipeline::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（.env → 配置文件 → 环境变量）
    let config = Config::load()?;

    // 初始化日志
    logger::init_with_verbose(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).run().await?;

    Ok(())
}
