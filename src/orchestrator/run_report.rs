//! 运行结果汇总

use crate::models::{Case, MeasurementId};
use std::collections::BTreeMap;
use std::fmt;

/// 场景状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    /// 尚未开始
    NotStarted,
    /// 批次已提交
    BatchesSubmitted,
    /// 正在轮询结果
    Polling,
    /// 已结束；`complete` 为 false 表示轮询次数用尽时仍有未结束的测量
    Done { complete: bool },
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseState::NotStarted => write!(f, "未开始"),
            CaseState::BatchesSubmitted => write!(f, "已提交"),
            CaseState::Polling => write!(f, "轮询中"),
            CaseState::Done { complete: true } => write!(f, "完成"),
            CaseState::Done { complete: false } => write!(f, "未完成"),
        }
    }
}

/// 一次运行（或恢复）的结果
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_name: String,
    pub cases: BTreeMap<Case, CaseState>,
    /// 轮询结束时仍未进入 finished 的测量
    pub outstanding: BTreeMap<Case, Vec<MeasurementId>>,
    /// 平台分配的测量总数
    pub submitted: usize,
    /// 提交失败的批次数
    pub failed_batches: usize,
    /// 执行的轮询次数
    pub polls: usize,
}

impl RunReport {
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_name: run_name.into(),
            cases: Case::ALL.iter().map(|c| (*c, CaseState::NotStarted)).collect(),
            ..Self::default()
        }
    }

    pub fn set_state(&mut self, case: Case, state: CaseState) {
        self.cases.insert(case, state);
    }

    pub fn state(&self, case: Case) -> CaseState {
        self.cases.get(&case).copied().unwrap_or(CaseState::NotStarted)
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.values().map(Vec::len).sum()
    }

    /// 所有场景完成、没有未结束的测量、没有失败批次
    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
            && self.failed_batches == 0
            && self
                .cases
                .values()
                .all(|s| *s == CaseState::Done { complete: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_not_complete() {
        let report = RunReport::new("r");
        assert_eq!(report.state(Case::Case2), CaseState::NotStarted);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_outstanding_makes_report_incomplete() {
        let mut report = RunReport::new("r");
        for case in Case::ALL {
            report.set_state(case, CaseState::Done { complete: true });
        }
        assert!(report.is_complete());

        report.outstanding.insert(Case::Case1, vec![MeasurementId(1), MeasurementId(2)]);
        assert_eq!(report.outstanding_count(), 2);
        assert!(!report.is_complete());
    }
}
