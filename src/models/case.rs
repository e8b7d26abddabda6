/// 测量场景
///
/// 四个固定场景，分别对应一种结构（fan-out / fan-in）和一对集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Case {
    /// 客户端 → 守卫中继
    Case1,
    /// 出口中继所在 AS → 目的地
    Case2,
    /// 目的地 → 出口中继
    Case3,
    /// 守卫中继所在 AS → 客户端
    Case4,
}

/// 场景结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseShape {
    /// 一组探针测量多个目标，按批次切分
    FanOut,
    /// 每个 AS 出一个探针，测量少量固定目标，单个批次
    FanIn,
}

impl Case {
    /// 全部场景，按执行顺序排列
    pub const ALL: [Case; 4] = [Case::Case1, Case::Case2, Case::Case3, Case::Case4];

    /// 获取场景编号
    pub fn number(self) -> u8 {
        match self {
            Case::Case1 => 1,
            Case::Case2 => 2,
            Case::Case3 => 3,
            Case::Case4 => 4,
        }
    }

    /// 获取标准名称（同时用作目录名）
    pub fn name(self) -> &'static str {
        match self {
            Case::Case1 => "case1",
            Case::Case2 => "case2",
            Case::Case3 => "case3",
            Case::Case4 => "case4",
        }
    }

    /// 场景结构
    pub fn shape(self) -> CaseShape {
        match self {
            Case::Case1 | Case::Case3 => CaseShape::FanOut,
            Case::Case2 | Case::Case4 => CaseShape::FanIn,
        }
    }

    /// 测量描述后缀，例如 `-c1`
    pub fn description(self, run_name: &str) -> String {
        format!("{}-c{}", run_name, self.number())
    }

    /// 从名称解析场景
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "case1" | "c1" => Some(Case::Case1),
            "case2" | "c2" => Some(Case::Case2),
            "case3" | "c3" => Some(Case::Case3),
            "case4" | "c4" => Some(Case::Case4),
            _ => None,
        }
    }
}

impl std::fmt::Display for Case {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
