/// 测量状态（平台的 status.id）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MeasurementStatus {
    /// 已定义
    Specified = 0,
    /// 已排期
    Scheduled = 1,
    /// 进行中
    Ongoing = 2,
    /// 已停止
    Stopped = 4,
    /// 被强制停止
    ForcedToStop = 5,
    /// 没有合适的探针
    NoSuitableProbes = 6,
    /// 失败
    Failed = 7,
    /// 已归档
    Archived = 8,
}

impl MeasurementStatus {
    /// 获取状态代码
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            MeasurementStatus::Specified => "Specified",
            MeasurementStatus::Scheduled => "Scheduled",
            MeasurementStatus::Ongoing => "Ongoing",
            MeasurementStatus::Stopped => "Stopped",
            MeasurementStatus::ForcedToStop => "Forced to stop",
            MeasurementStatus::NoSuitableProbes => "No suitable probes",
            MeasurementStatus::Failed => "Failed",
            MeasurementStatus::Archived => "Archived",
        }
    }

    /// 从代码解析状态
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(MeasurementStatus::Specified),
            1 => Some(MeasurementStatus::Scheduled),
            2 => Some(MeasurementStatus::Ongoing),
            4 => Some(MeasurementStatus::Stopped),
            5 => Some(MeasurementStatus::ForcedToStop),
            6 => Some(MeasurementStatus::NoSuitableProbes),
            7 => Some(MeasurementStatus::Failed),
            8 => Some(MeasurementStatus::Archived),
            _ => None,
        }
    }

    /// 是否仍占用配额（0, 1, 2）
    pub fn is_running(self) -> bool {
        matches!(
            self,
            MeasurementStatus::Specified | MeasurementStatus::Scheduled | MeasurementStatus::Ongoing
        )
    }

    /// 是否已进入终态
    pub fn is_terminal(self) -> bool {
        !self.is_running()
    }

    /// 查询运行中测量时使用的状态过滤参数
    pub fn running_filter() -> &'static str {
        "0,1,2"
    }
}

impl std::fmt::Display for MeasurementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_and_terminal_codes() {
        for code in [0, 1, 2] {
            assert!(MeasurementStatus::from_code(code).unwrap().is_running());
        }
        for code in [4, 5, 6, 7, 8] {
            assert!(MeasurementStatus::from_code(code).unwrap().is_terminal());
        }
        assert_eq!(MeasurementStatus::from_code(3), None);
    }
}
