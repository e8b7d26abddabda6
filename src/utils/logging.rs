use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::models::{Case, SetCosts};
use crate::orchestrator::{CaseSubmission, RunReport};

/// 初始化全局日志：标准输出 + 可选的运行日志文件
///
/// # 参数
/// - `log_file`: 运行日志文件路径，None 时只输出到终端
/// - `verbose`: 未设置 `RUST_LOG` 时是否使用 debug 级别
pub fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            init_log_file(path)?;
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// 写入日志文件头（追加，恢复运行时保留旧日志）
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_header = format!(
        "{}\n测量运行日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    file.write_all(log_header.as_bytes())?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, run_name: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 运行 {}", run_name);
    info!(
        "📊 配额: {} | 每批最多: {} | {}",
        config.quota, config.chunk_size, config.ip_version
    );
    info!(
        "⏱️ 配额等待 {}s | 轮询间隔 {}s × {} 次 | 提交间隔 {}s",
        config.quota_wait_secs,
        config.poll_interval_secs,
        config.max_poll_attempts,
        config.submit_pause_secs
    );
    info!("{}", "=".repeat(60));
}

/// 记录各场景的理论积分
pub fn log_set_costs(costs: &SetCosts) {
    info!("💰 理论积分消耗:");
    info!("  case1: {}", costs.case1);
    info!("  case2: {}", costs.case2);
    info!("  case3: {}", costs.case3);
    info!("  case4: {}", costs.case4);
    info!("  合计: {}", costs.total());
}

/// 记录场景开始信息
///
/// # 参数
/// - `case`: 场景
/// - `batches`: 批次数
/// - `estimated_cost`: 积分估算
pub fn log_case_start(case: Case, batches: usize, estimated_cost: u64) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始提交 {}", case);
    info!("📄 共 {} 个批次，预计消耗 {} 积分", batches, estimated_cost);
    info!("{}", "=".repeat(60));
}

/// 记录场景完成信息
pub fn log_case_complete(case: Case, stats: &CaseSubmission) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ {} 提交完成: 成功 {}/{} 批，{} 个测量",
        case, stats.submitted_batches, stats.batches, stats.submitted_jobs
    );
    if stats.failed_batches > 0 {
        info!("❌ 失败批次: {}", stats.failed_batches);
    }
    info!("{}", "─".repeat(60));
}

/// 记录轮询进度
pub fn log_poll_attempt(attempt: usize, max_attempts: usize) {
    info!("🔁 第 {}/{} 次轮询结果", attempt, max_attempts);
}

/// 打印最终统计信息
///
/// # 参数
/// - `report`: 运行结果
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(report: &RunReport, log_file_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 运行 {} 统计", report.run_name);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for (case, state) in &report.cases {
        info!("  {}: {}", case, state);
    }
    info!("📤 提交测量: {}", report.submitted);
    info!("❌ 失败批次: {}", report.failed_batches);
    info!("🔁 轮询次数: {}", report.polls);
    for (case, ids) in &report.outstanding {
        let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        info!("⏳ {} 未结束: {}", case, list.join(", "));
    }
    if report.is_complete() {
        info!("✅ 全部完成");
    } else {
        info!("⚠️ 部分完成");
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_log_file_appends_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("run.log");
        init_log_file(&path).unwrap();
        init_log_file(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("测量运行日志").count(), 2);
    }
}
