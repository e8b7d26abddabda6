use anyhow::{Context, Result};
use atlas_orchestrator::config::{Config, RunMode};
use atlas_orchestrator::models::load_measurement_sets;
use atlas_orchestrator::services::{check_running, stop_all_running, ResultStore};
use atlas_orchestrator::utils::init_logging;
use atlas_orchestrator::{App, AtlasClient};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    match config.mode {
        RunMode::Check => {
            init_logging(None, config.verbose_logging)?;
            let client = AtlasClient::new(&config)?;
            check_running(&client).await?;
        }
        RunMode::StopAll => {
            init_logging(None, config.verbose_logging)?;
            let client = AtlasClient::new(&config)?;
            stop_all_running(&client, config.submit_pause()).await?;
        }
        RunMode::Run => {
            let run_name = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
            let store = ResultStore::create(&config.output_dir, &run_name)?;
            init_logging(Some(&store.log_path()), config.verbose_logging)?;

            let sets_path = config.sets_path();
            let sets = load_measurement_sets(&sets_path).await?;
            let archived = store.archive_sets(&sets_path)?;
            info!("📁 已复制 {} 个集合文件到运行目录", archived);

            // 初始化并运行应用
            let report = App::initialize(config, store)?.run(sets).await?;
            if !report.is_complete() {
                warn!("⚠️ 运行未全部完成: {}", report.run_name);
            }
        }
        RunMode::Resume => {
            let run_dir = config
                .resume_dir
                .clone()
                .context("恢复模式需要 resume_dir")?;
            let store = ResultStore::open(&run_dir)?;
            init_logging(Some(&store.log_path()), config.verbose_logging)?;

            let report = App::initialize(config, store)?.resume().await?;
            if !report.is_complete() {
                warn!("⚠️ 运行未全部完成: {}", report.run_name);
            }
        }
    }

    Ok(())
}
