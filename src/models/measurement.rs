use serde::{Deserialize, Serialize};
use std::fmt;

/// 每个单次 traceroute 的积分消耗（is_oneoff = true）
pub const COST_PER_TRACEROUTE: u64 = 20;

/// 平台分配的测量 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementId(pub u64);

impl fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MeasurementId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(MeasurementId)
    }
}

/// 单个测量定义（一个目标）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementDefinition {
    pub target: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub af: u8,
    pub is_public: bool,
    pub protocol: String,
    pub response_timeout: u32,
    pub is_oneoff: bool,
    /// 只发一个包以降低积分消耗
    pub packets: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port: Option<u16>,
}

impl MeasurementDefinition {
    /// 按模板创建 traceroute 定义
    pub fn traceroute(target: impl Into<String>, port: Option<u16>, af: u8, description: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            description: description.into(),
            kind: "traceroute".to_string(),
            af,
            is_public: true,
            protocol: "ICMP".to_string(),
            response_timeout: 20000,
            is_oneoff: true,
            packets: 1,
            port,
        }
    }
}

/// 请求方选择器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    /// 显式的探针 ID 列表
    Probes,
    /// 某个 AS 中任选探针
    Asn,
}

/// 选择器取值：探针列表为逗号分隔字符串，AS 为整数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorValue {
    Asn(u32),
    List(String),
}

/// 请求方选择器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSelector {
    pub requested: u32,
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    pub value: SelectorValue,
}

impl ProbeSelector {
    /// 显式探针列表，requested 等于探针数量
    pub fn probe_list(probes: &[u64]) -> Self {
        let value = probes
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            requested: probes.len() as u32,
            kind: SelectorKind::Probes,
            value: SelectorValue::List(value),
        }
    }

    /// 每个 AS 只要一个代表探针
    pub fn one_from_asn(asn: u32) -> Self {
        Self {
            requested: 1,
            kind: SelectorKind::Asn,
            value: SelectorValue::Asn(asn),
        }
    }
}

/// 一次提交的批次定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementBatch {
    pub definitions: Vec<MeasurementDefinition>,
    pub probes: Vec<ProbeSelector>,
    pub is_oneoff: bool,
}

impl Default for MeasurementBatch {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            probes: Vec::new(),
            is_oneoff: true,
        }
    }
}

impl MeasurementBatch {
    /// 批次中的测量数量（即提交后占用的配额）
    pub fn job_count(&self) -> usize {
        self.definitions.len()
    }

    /// 积分估算：20 × 测量数 × 请求探针总数（不含重试和包数）
    pub fn estimated_cost(&self) -> u64 {
        let requested: u64 = self.probes.iter().map(|p| p.requested as u64).sum();
        COST_PER_TRACEROUTE * self.definitions.len() as u64 * requested
    }
}
