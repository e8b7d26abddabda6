//! 账户维护服务 - 业务能力层
//!
//! 面向整个账户的操作：查询和停止所有运行中的测量

use crate::clients::AtlasApi;
use crate::error::AppResult;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// 查询运行中的测量数量
pub async fn check_running<A: AtlasApi + ?Sized>(api: &A) -> AppResult<usize> {
    let count = api.active_measurement_count().await?;
    if count == 0 {
        info!("✓ 当前没有运行中的测量");
    } else {
        info!("📊 当前有 {} 个运行中的测量", count);
    }
    Ok(count)
}

/// 停止账户下所有运行中的测量
///
/// 循环直到平台不再报告运行中的测量：逐个停止 → 等待 → 逐个刷新 → 等待 → 重新查询
///
/// # 参数
/// - `api`: 平台客户端
/// - `pause`: 每一步之后的等待时间
///
/// # 返回
/// 返回发出的停止请求数
pub async fn stop_all_running<A: AtlasApi + ?Sized>(api: &A, pause: Duration) -> AppResult<usize> {
    let mut issued = 0;
    let mut round = 0;

    loop {
        let running = api.running_measurements().await?;
        if running.is_empty() {
            info!("✓ 所有测量已停止（共发出 {} 个停止请求）", issued);
            return Ok(issued);
        }

        round += 1;
        info!("🛑 第 {} 轮: 停止 {} 个运行中的测量", round, running.len());

        for id in &running {
            match api.stop_measurement(*id).await {
                Ok(()) => info!("  已停止 {}", id),
                Err(e) => warn!("⚠️ 停止测量 {} 失败: {}", id, e),
            }
            issued += 1;
        }
        sleep(pause).await;

        for id in &running {
            if let Err(e) = api.refresh_measurement(*id).await {
                warn!("⚠️ 刷新测量 {} 失败: {}", id, e);
            }
        }
        sleep(pause).await;
    }
}
