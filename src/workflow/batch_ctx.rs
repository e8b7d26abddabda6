//! 批次处理上下文
//!
//! 封装"我正在提交哪个场景的第几批"这一信息

use crate::models::Case;
use std::fmt::Display;

/// 批次处理上下文
#[derive(Debug, Clone)]
pub struct BatchCtx {
    /// 场景
    pub case: Case,

    /// 批次在场景中的索引（从0开始，同时用于文件名）
    pub batch_index: usize,

    /// 场景的批次总数（仅用于日志显示）
    pub total_batches: usize,
}

impl BatchCtx {
    pub fn new(case: Case, batch_index: usize, total_batches: usize) -> Self {
        Self {
            case,
            batch_index,
            total_batches,
        }
    }
}

impl Display for BatchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} 批次 {}/{}]",
            self.case,
            self.batch_index + 1,
            self.total_batches
        )
    }
}
