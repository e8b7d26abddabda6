//! 结果对账服务 - 业务能力层
//!
//! 一次调用执行一轮非阻塞的"拉取并合并"：
//! 1. 已请求停止的测量：确认是否进入终态，否则重新停止并刷新
//! 2. 活跃测量：拉取结果，与快照比较；两次拉取条数相同视为稳定并请求停止
//! 3. 汇总本轮新下载的文件与各桶计数

use crate::clients::AtlasApi;
use crate::models::{Case, MeasurementId};
use crate::services::result_store::{ResultStore, SnapshotState};
use crate::workflow::{Bucket, BucketCounts, LifecycleTracker};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

/// 一轮对账的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// 首次落盘的快照数
    pub new_files: usize,
    /// 被更长结果覆盖的快照数
    pub updated_files: usize,
    /// 本轮转入 stop_requested 的数量
    pub stop_issued: usize,
    /// 本轮确认进入 finished 的数量
    pub confirmed: usize,
    /// 拉取失败或结构异常的数量
    pub failures: usize,
    /// 跟踪的 ID 总数
    pub total: usize,
    /// 本轮结束时的各桶计数
    pub counts: BucketCounts,
}

/// 单个活跃测量的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Failed,
    Empty,
    Stored,
    Grew,
    Stable,
    Shrank,
}

/// 结果对账服务
///
/// 职责：
/// - 只做一轮，不等待
/// - 只修改传入的跟踪器和快照文件
/// - 远程失败记日志，留到下一轮
pub struct ResultReconciler<'a, A: AtlasApi + ?Sized> {
    api: &'a A,
    store: &'a ResultStore,
}

impl<'a, A: AtlasApi + ?Sized> ResultReconciler<'a, A> {
    pub fn new(api: &'a A, store: &'a ResultStore) -> Self {
        Self { api, store }
    }

    /// 执行一轮对账并保存跟踪器
    pub async fn sweep_and_save(&self, tracker: &mut LifecycleTracker) -> SweepSummary {
        let summary = self.sweep(tracker).await;
        if let Err(e) = self.store.save_tracker(tracker) {
            warn!("⚠️ 保存生命周期文件失败: {}", e);
        }
        summary
    }

    /// 执行一轮对账
    ///
    /// # 参数
    /// - `tracker`: 生命周期跟踪器
    ///
    /// # 返回
    /// 返回本轮汇总
    pub async fn sweep(&self, tracker: &mut LifecycleTracker) -> SweepSummary {
        let mut summary = SweepSummary::default();

        for case in tracker.cases() {
            for id in tracker.ids_in(case, Bucket::StopRequested) {
                if self.confirm_stopped(id).await {
                    tracker.move_to(case, id, Bucket::Finished);
                    summary.confirmed += 1;
                }
            }
        }

        for case in tracker.cases() {
            for id in tracker.ids_in(case, Bucket::Active) {
                match self.fetch_active(case, id).await {
                    FetchOutcome::Failed => summary.failures += 1,
                    FetchOutcome::Stored => summary.new_files += 1,
                    FetchOutcome::Grew => summary.updated_files += 1,
                    FetchOutcome::Stable => {
                        self.request_stop(id).await;
                        tracker.move_to(case, id, Bucket::StopRequested);
                        summary.stop_issued += 1;
                    }
                    FetchOutcome::Empty | FetchOutcome::Shrank => {}
                }
            }
        }

        summary.total = tracker.total();
        summary.counts = tracker.counts();
        info!(
            "📥 新下载 {} 个文件 | 共跟踪 {} 个测量 | {}",
            summary.new_files, summary.total, summary.counts
        );
        summary
    }

    /// 查询已请求停止的测量是否进入终态，未进入则重新停止并刷新
    async fn confirm_stopped(&self, id: MeasurementId) -> bool {
        match self.api.measurement_status(id, false).await {
            Ok(Some(status)) if status.is_terminal() => {
                debug!("测量 {} 已结束: {}", id, status);
                return true;
            }
            Ok(Some(status)) => debug!("测量 {} 仍在运行: {}", id, status),
            Ok(None) => debug!("测量 {} 状态未知", id),
            Err(e) => warn!("⚠️ 查询测量 {} 状态失败: {}", id, e),
        }

        self.request_stop(id).await;
        if let Err(e) = self.api.refresh_measurement(id).await {
            warn!("⚠️ 刷新测量 {} 失败: {}", id, e);
        }
        false
    }

    async fn request_stop(&self, id: MeasurementId) {
        if let Err(e) = self.api.stop_measurement(id).await {
            warn!("⚠️ 停止测量 {} 失败: {}", id, e);
        }
    }

    async fn fetch_active(&self, case: Case, id: MeasurementId) -> FetchOutcome {
        let payload = match self.api.measurement_result(id).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("⚠️ [{}] 拉取测量 {} 结果失败: {}", case, id, e);
                return FetchOutcome::Failed;
            }
        };

        let records = match &payload {
            JsonValue::Array(records) => records.len(),
            other => {
                warn!("⚠️ [{}] 测量 {} 的结果不是数组: {}", case, id, type_name(other));
                return FetchOutcome::Failed;
            }
        };
        if records == 0 {
            return FetchOutcome::Empty;
        }

        match self.store.snapshot_state(case, id) {
            SnapshotState::Records(stored) if records == stored => FetchOutcome::Stable,
            SnapshotState::Records(stored) if records < stored => {
                debug!("[{}] 测量 {} 结果变短 ({} < {})，保留原快照", case, id, records, stored);
                FetchOutcome::Shrank
            }
            SnapshotState::Records(stored) => {
                debug!("[{}] 测量 {} 结果增长 {} → {}", case, id, stored, records);
                self.write(case, id, &payload, FetchOutcome::Grew)
            }
            SnapshotState::Unreadable => {
                warn!("⚠️ [{}] 测量 {} 的快照无法解析，重新写入", case, id);
                self.write(case, id, &payload, FetchOutcome::Stored)
            }
            SnapshotState::Absent => self.write(case, id, &payload, FetchOutcome::Stored),
        }
    }

    fn write(&self, case: Case, id: MeasurementId, payload: &JsonValue, outcome: FetchOutcome) -> FetchOutcome {
        match self.store.write_snapshot(case, id, payload) {
            Ok(()) => outcome,
            Err(e) => {
                warn!("⚠️ [{}] 写入测量 {} 快照失败: {}", case, id, e);
                FetchOutcome::Failed
            }
        }
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
