//! 测量生命周期跟踪
//!
//! 场景 → 测量 ID → 状态桶。每个 ID 在所属场景中恰好处于一个桶，记录永不删除

use crate::models::{Case, MeasurementId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 状态桶
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// 已提交，仍在拉取结果
    Active,
    /// 结果已稳定，已请求停止，等待平台确认
    StopRequested,
    /// 平台确认已进入终态
    Finished,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bucket::Active => "active",
            Bucket::StopRequested => "stop_requested",
            Bucket::Finished => "finished",
        };
        write!(f, "{}", name)
    }
}

/// 单个场景的三个桶
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseBuckets {
    #[serde(default)]
    pub active: BTreeSet<MeasurementId>,
    #[serde(default)]
    pub stop_requested: BTreeSet<MeasurementId>,
    #[serde(default)]
    pub finished: BTreeSet<MeasurementId>,
}

impl CaseBuckets {
    fn set_mut(&mut self, bucket: Bucket) -> &mut BTreeSet<MeasurementId> {
        match bucket {
            Bucket::Active => &mut self.active,
            Bucket::StopRequested => &mut self.stop_requested,
            Bucket::Finished => &mut self.finished,
        }
    }

    fn set(&self, bucket: Bucket) -> &BTreeSet<MeasurementId> {
        match bucket {
            Bucket::Active => &self.active,
            Bucket::StopRequested => &self.stop_requested,
            Bucket::Finished => &self.finished,
        }
    }

    fn bucket_of(&self, id: MeasurementId) -> Option<Bucket> {
        [Bucket::Active, Bucket::StopRequested, Bucket::Finished]
            .into_iter()
            .find(|b| self.set(*b).contains(&id))
    }

    fn len(&self) -> usize {
        self.active.len() + self.stop_requested.len() + self.finished.len()
    }
}

/// 各桶计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub active: usize,
    pub stop_requested: usize,
    pub finished: usize,
}

impl BucketCounts {
    pub fn total(&self) -> usize {
        self.active + self.stop_requested + self.finished
    }

    /// 尚未进入终态的数量
    pub fn outstanding(&self) -> usize {
        self.active + self.stop_requested
    }
}

impl fmt::Display for BucketCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "active {} | stop_requested {} | finished {}",
            self.active, self.stop_requested, self.finished
        )
    }
}

/// 生命周期跟踪器
///
/// 作为显式上下文在驱动、配额控制和结果对账之间按引用传递
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LifecycleTracker {
    cases: BTreeMap<Case, CaseBuckets>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新提交的测量为 active，已登记的 ID 保持原状
    ///
    /// # 返回
    /// 返回新登记的数量
    pub fn register(&mut self, case: Case, ids: &[MeasurementId]) -> usize {
        let buckets = self.cases.entry(case).or_default();
        let mut added = 0;
        for id in ids {
            if buckets.bucket_of(*id).is_none() {
                buckets.active.insert(*id);
                added += 1;
            }
        }
        added
    }

    /// 将测量放入指定桶（不存在时新建记录）
    pub fn move_to(&mut self, case: Case, id: MeasurementId, bucket: Bucket) {
        let buckets = self.cases.entry(case).or_default();
        if let Some(current) = buckets.bucket_of(id) {
            if current == bucket {
                return;
            }
            buckets.set_mut(current).remove(&id);
        }
        buckets.set_mut(bucket).insert(id);
    }

    pub fn bucket_of(&self, case: Case, id: MeasurementId) -> Option<Bucket> {
        self.cases.get(&case).and_then(|b| b.bucket_of(id))
    }

    /// 某个场景某个桶中的 ID，升序
    pub fn ids_in(&self, case: Case, bucket: Bucket) -> Vec<MeasurementId> {
        self.cases
            .get(&case)
            .map(|b| b.set(bucket).iter().copied().collect())
            .unwrap_or_default()
    }

    /// 全部记录 (场景, ID, 桶)
    pub fn entries(&self) -> Vec<(Case, MeasurementId, Bucket)> {
        let mut entries = Vec::with_capacity(self.total());
        for (case, b) in &self.cases {
            for bucket in [Bucket::Active, Bucket::StopRequested, Bucket::Finished] {
                entries.extend(b.set(bucket).iter().map(|id| (*case, *id, bucket)));
            }
        }
        entries
    }

    /// 有记录的场景，按场景顺序
    pub fn cases(&self) -> Vec<Case> {
        self.cases.keys().copied().collect()
    }

    pub fn case_counts(&self, case: Case) -> BucketCounts {
        self.cases
            .get(&case)
            .map(|b| BucketCounts {
                active: b.active.len(),
                stop_requested: b.stop_requested.len(),
                finished: b.finished.len(),
            })
            .unwrap_or_default()
    }

    pub fn counts(&self) -> BucketCounts {
        self.cases.keys().fold(BucketCounts::default(), |acc, case| {
            let c = self.case_counts(*case);
            BucketCounts {
                active: acc.active + c.active,
                stop_requested: acc.stop_requested + c.stop_requested,
                finished: acc.finished + c.finished,
            }
        })
    }

    /// 跟踪的 ID 总数
    pub fn total(&self) -> usize {
        self.cases.values().map(CaseBuckets::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn is_case_finished(&self, case: Case) -> bool {
        self.case_counts(case).outstanding() == 0
    }

    /// 所有 ID 都已进入 finished
    pub fn all_finished(&self) -> bool {
        self.cases.keys().all(|c| self.is_case_finished(*c))
    }

    /// 每个场景尚未结束的 ID
    pub fn outstanding(&self) -> BTreeMap<Case, Vec<MeasurementId>> {
        self.cases
            .iter()
            .filter_map(|(case, b)| {
                let ids: Vec<MeasurementId> =
                    b.active.iter().chain(b.stop_requested.iter()).copied().collect();
                (!ids.is_empty()).then_some((*case, ids))
            })
            .collect()
    }
}
