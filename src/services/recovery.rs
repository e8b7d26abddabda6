//! 恢复服务 - 业务能力层
//!
//! 从运行目录重建生命周期跟踪器：
//! - ID 来自提交应答和结果快照，旧的 `lifecycle.json` 只作为提示
//! - 每个 ID 查询一次平台状态

use crate::clients::{parse_submission_ids, AtlasApi};
use crate::error::AppResult;
use crate::models::{Case, MeasurementId, MeasurementStatus};
use crate::services::result_store::{ResultStore, SnapshotState};
use crate::workflow::{Bucket, LifecycleTracker};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// 同时查询状态的数量
const STATUS_QUERY_BATCH: usize = 10;

/// 根据平台状态、快照和旧桶决定恢复后的桶
///
/// - 终态且有快照 → finished
/// - 终态但没有快照 → active（再拉取一次）
/// - 运行中且之前已请求停止 → stop_requested
/// - 其余（包括状态未知）→ active
pub fn recovered_bucket(
    status: Option<MeasurementStatus>,
    has_snapshot: bool,
    previous: Option<Bucket>,
) -> Bucket {
    match status {
        Some(s) if s.is_terminal() && has_snapshot => Bucket::Finished,
        Some(s) if s.is_terminal() => Bucket::Active,
        Some(_) if previous == Some(Bucket::StopRequested) => Bucket::StopRequested,
        _ => Bucket::Active,
    }
}

/// 从运行目录重建跟踪器
///
/// # 参数
/// - `store`: 运行目录
/// - `api`: 平台客户端
///
/// # 返回
/// 返回重建后的跟踪器（同时写回 `lifecycle.json`）
pub async fn recover_tracker<A: AtlasApi + ?Sized>(
    store: &ResultStore,
    api: &A,
) -> AppResult<LifecycleTracker> {
    let hint = match store.load_tracker() {
        Ok(hint) => hint.unwrap_or_default(),
        Err(e) => {
            warn!("⚠️ 旧的生命周期文件无法读取，忽略: {}", e);
            LifecycleTracker::default()
        }
    };

    let mut known: BTreeMap<(Case, MeasurementId), Option<Bucket>> = BTreeMap::new();
    for response in store.read_responses()? {
        match parse_submission_ids(&response.raw) {
            Ok(ids) => {
                for id in ids {
                    known.entry((response.case, id)).or_insert(None);
                }
            }
            Err(e) => warn!(
                "⚠️ [{}] 第 {} 批的提交应答没有测量 ID: {}",
                response.case, response.batch_index, e
            ),
        }
    }
    for key in store.snapshot_ids()? {
        known.entry(key).or_insert(None);
    }
    for (case, id, bucket) in hint.entries() {
        known.insert((case, id), Some(bucket));
    }

    info!("🔄 正在恢复 {} 个测量的状态...", known.len());

    let keys: Vec<(Case, MeasurementId)> = known.keys().copied().collect();
    let mut tracker = LifecycleTracker::new();
    for chunk in keys.chunks(STATUS_QUERY_BATCH) {
        let statuses = join_all(chunk.iter().map(|(_, id)| api.measurement_status(*id, false))).await;

        for ((case, id), status) in chunk.iter().zip(statuses) {
            let status = match status {
                Ok(status) => status,
                Err(e) => {
                    warn!("⚠️ 查询测量 {} 状态失败: {}", id, e);
                    None
                }
            };
            let has_snapshot = matches!(store.snapshot_state(*case, *id), SnapshotState::Records(_));
            let previous = known.get(&(*case, *id)).copied().flatten();
            let bucket = recovered_bucket(status, has_snapshot, previous);
            debug!("[{}] 测量 {} → {}", case, id, bucket);
            tracker.move_to(*case, *id, bucket);
        }
    }

    store.save_tracker(&tracker)?;
    info!("✓ 恢复完成: {}", tracker.counts());
    Ok(tracker)
}
