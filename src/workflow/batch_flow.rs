//! 批次提交流程 - 流程层
//!
//! 核心职责：定义"一个批次"的完整提交流程
//!
//! 流程顺序：
//! 1. 保存批次定义
//! 2. 等待配额
//! 3. 提交
//! 4. 原样保存应答
//! 5. 从应答取出 ID 并登记为 active
//! 6. 暂停

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::clients::{parse_submission_ids, AtlasApi};
use crate::models::MeasurementBatch;
use crate::services::{QuotaGovernor, ResultStore};
use crate::workflow::batch_ctx::BatchCtx;
use crate::workflow::lifecycle_tracker::LifecycleTracker;

/// 批次提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 提交成功，平台分配的测量数
    Submitted(usize),
    /// 提交失败，本批次丢弃
    Failed,
}

/// 批次提交流程
///
/// - 编排单个批次的提交步骤
/// - 不持有任何资源，只借用客户端、存储和配额控制
/// - 提交失败只影响本批次
pub struct BatchFlow<'a, A: AtlasApi + ?Sized> {
    api: &'a A,
    store: &'a ResultStore,
    governor: QuotaGovernor<'a, A>,
    submit_pause: Duration,
}

impl<'a, A: AtlasApi + ?Sized> BatchFlow<'a, A> {
    pub fn new(
        api: &'a A,
        store: &'a ResultStore,
        governor: QuotaGovernor<'a, A>,
        submit_pause: Duration,
    ) -> Self {
        Self {
            api,
            store,
            governor,
            submit_pause,
        }
    }

    /// 提交一个批次
    ///
    /// # 参数
    /// - `batch`: 批次定义
    /// - `ctx`: 批次上下文
    /// - `tracker`: 生命周期跟踪器
    ///
    /// # 返回
    /// 返回提交结果；只有本地文件写入失败才返回错误
    pub async fn run(
        &self,
        batch: &MeasurementBatch,
        ctx: &BatchCtx,
        tracker: &mut LifecycleTracker,
    ) -> Result<BatchOutcome> {
        info!(
            "{} 📋 {} 个测量，预计消耗 {} 积分",
            ctx,
            batch.job_count(),
            batch.estimated_cost()
        );

        self.store
            .write_definition(ctx.case, ctx.batch_index, batch)
            .with_context(|| format!("{} 无法保存批次定义", ctx))?;

        // ========== 等待配额 ==========
        let rounds = self.governor.admit(batch.job_count(), tracker).await;
        if rounds > 0 {
            info!("{} ✓ 等待 {} 轮后获得配额", ctx, rounds);
        }

        // ========== 提交 ==========
        info!("{} 📤 正在提交...", ctx);
        let raw = match self.api.submit_batch(batch).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("{} ❌ 提交失败，丢弃本批次: {}", ctx, e);
                return Ok(BatchOutcome::Failed);
            }
        };

        // ========== 保存应答并登记 ==========
        if let Err(e) = self.store.write_response(ctx.case, ctx.batch_index, &raw) {
            warn!("{} ⚠️ 无法保存提交应答: {}", ctx, e);
        }

        let ids = match parse_submission_ids(&raw) {
            Ok(ids) => ids,
            Err(e) => {
                error!("{} ❌ 提交应答中没有测量 ID，丢弃本批次: {}", ctx, e);
                return Ok(BatchOutcome::Failed);
            }
        };

        let added = tracker.register(ctx.case, &ids);
        self.store
            .save_tracker(tracker)
            .with_context(|| format!("{} 无法保存生命周期文件", ctx))?;
        info!("{} ✓ 提交成功，登记 {} 个测量", ctx, added);

        sleep(self.submit_pause).await;
        Ok(BatchOutcome::Submitted(ids.len()))
    }
}
