//! 单个场景处理器 - 编排层
//!
//! 遍历一个场景的全部批次，逐个交给 `BatchFlow` 提交，并汇总统计

use crate::clients::AtlasApi;
use crate::models::{Case, MeasurementBatch};
use crate::utils::logging::{log_case_complete, log_case_start};
use crate::workflow::{BatchCtx, BatchFlow, BatchOutcome, LifecycleTracker};
use anyhow::Result;

/// 场景提交统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaseSubmission {
    pub batches: usize,
    pub submitted_batches: usize,
    pub failed_batches: usize,
    /// 平台分配的测量数
    pub submitted_jobs: usize,
    /// 全部批次的积分估算
    pub estimated_cost: u64,
}

/// 提交单个场景的全部批次
///
/// # 参数
/// - `flow`: 批次提交流程
/// - `case`: 场景
/// - `batches`: 该场景的批次定义
/// - `tracker`: 生命周期跟踪器
///
/// # 返回
/// 返回场景提交统计
pub async fn process_case<A: AtlasApi + ?Sized>(
    flow: &BatchFlow<'_, A>,
    case: Case,
    batches: &[MeasurementBatch],
    tracker: &mut LifecycleTracker,
) -> Result<CaseSubmission> {
    let mut stats = CaseSubmission {
        batches: batches.len(),
        estimated_cost: batches.iter().map(MeasurementBatch::estimated_cost).sum(),
        ..CaseSubmission::default()
    };

    log_case_start(case, batches.len(), stats.estimated_cost);

    for (index, batch) in batches.iter().enumerate() {
        let ctx = BatchCtx::new(case, index, batches.len());
        match flow.run(batch, &ctx, tracker).await? {
            BatchOutcome::Submitted(jobs) => {
                stats.submitted_batches += 1;
                stats.submitted_jobs += jobs;
            }
            BatchOutcome::Failed => stats.failed_batches += 1,
        }
    }

    log_case_complete(case, &stats);
    Ok(stats)
}
