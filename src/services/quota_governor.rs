//! 配额控制服务 - 业务能力层
//!
//! 只负责"等到平台上有足够空位"，等待期间推进结果对账

use crate::clients::AtlasApi;
use crate::services::result_reconciler::ResultReconciler;
use crate::workflow::LifecycleTracker;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// 配额控制服务
///
/// 职责：
/// - 每次决策都重新查询平台的运行数量，不缓存
/// - 空位不足时等待固定间隔，并执行一轮对账
/// - 不设等待上限
pub struct QuotaGovernor<'a, A: AtlasApi + ?Sized> {
    api: &'a A,
    reconciler: ResultReconciler<'a, A>,
    quota: usize,
    wait: Duration,
}

impl<'a, A: AtlasApi + ?Sized> QuotaGovernor<'a, A> {
    pub fn new(api: &'a A, reconciler: ResultReconciler<'a, A>, quota: usize, wait: Duration) -> Self {
        Self {
            api,
            reconciler,
            quota,
            wait,
        }
    }

    /// 阻塞直到 `运行中 + pending ≤ quota`
    ///
    /// # 参数
    /// - `pending`: 即将提交的测量数
    /// - `tracker`: 等待期间对账使用的跟踪器
    ///
    /// # 返回
    /// 返回等待的轮数
    pub async fn admit(&self, pending: usize, tracker: &mut LifecycleTracker) -> usize {
        let needed = if pending > self.quota {
            error!(
                "❌ 批次大小 {} 超过配额 {}，只能在平台空闲时提交，提交后运行数将超出配额 {} 个",
                pending,
                self.quota,
                pending - self.quota
            );
            self.quota
        } else {
            pending
        };

        let mut rounds = 0;
        loop {
            match self.api.active_measurement_count().await {
                Ok(active) if active + needed <= self.quota => {
                    debug!("配额检查通过: 运行中 {} + 待提交 {} ≤ {}", active, pending, self.quota);
                    return rounds;
                }
                Ok(active) => info!(
                    "⏳ 运行中 {} + 待提交 {} > 配额 {}，等待 {} 秒",
                    active,
                    pending,
                    self.quota,
                    self.wait.as_secs()
                ),
                Err(e) => warn!(
                    "⚠️ 查询运行中测量数量失败，{} 秒后重试: {}",
                    self.wait.as_secs(),
                    e
                ),
            }

            sleep(self.wait).await;
            self.reconciler.sweep_and_save(tracker).await;
            rounds += 1;
        }
    }
}
