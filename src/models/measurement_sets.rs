use crate::models::case::Case;
use crate::models::measurement::COST_PER_TRACEROUTE;
use crate::models::participant::{IpVersion, ParticipantSet};

/// 一次运行使用的全部参与者集合
///
/// - `c_as`: 客户端集合
/// - `d_as`: 目的地集合
/// - `g_as` / `e_as`: 守卫 / 出口中继，按 AS 分组
/// - `g_as_r` / `e_as_r`: 同上，但只保留有探针的 AS
#[derive(Debug, Clone, Default)]
pub struct MeasurementSets {
    pub c_as: ParticipantSet,
    pub d_as: ParticipantSet,
    pub g_as: ParticipantSet,
    pub e_as: ParticipantSet,
    pub g_as_r: ParticipantSet,
    pub e_as_r: ParticipantSet,
}

/// 各场景的理论积分消耗
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetCosts {
    pub case1: u64,
    pub case2: u64,
    pub case3: u64,
    pub case4: u64,
}

impl SetCosts {
    pub fn total(&self) -> u64 {
        self.case1 + self.case2 + self.case3 + self.case4
    }
}

impl MeasurementSets {
    /// 集合文件名（不含扩展名）
    pub const FILE_NAMES: [&'static str; 6] = ["c_as", "d_as", "g_as", "e_as", "g_as_r", "e_as_r"];

    /// 场景对应的 (请求方, 目标) 集合
    pub fn origin_and_target(&self, case: Case) -> (&ParticipantSet, &ParticipantSet) {
        match case {
            Case::Case1 => (&self.c_as, &self.g_as),
            Case::Case2 => (&self.e_as_r, &self.d_as),
            Case::Case3 => (&self.d_as, &self.e_as),
            Case::Case4 => (&self.g_as_r, &self.c_as),
        }
    }

    /// 场景是否适用：客户端集合决定 case1/case4，目的地集合决定 case2/case3
    pub fn is_applicable(&self, case: Case) -> bool {
        let (origin, target) = self.origin_and_target(case);
        !origin.is_empty() && !target.is_empty()
    }

    /// 对所有集合丢弃在指定 IP 版本下不可达的成员
    pub fn retain_reachable(&mut self, version: IpVersion) {
        for set in [
            &mut self.c_as,
            &mut self.d_as,
            &mut self.g_as,
            &mut self.e_as,
            &mut self.g_as_r,
            &mut self.e_as_r,
        ] {
            set.retain_reachable(version);
        }
    }

    /// 理论积分：20 × |请求方| × |目标|，按集合大小粗略估算
    pub fn theoretical_costs(&self) -> SetCosts {
        let cost = |case: Case| {
            let (origin, target) = self.origin_and_target(case);
            COST_PER_TRACEROUTE * origin.len() as u64 * target.len() as u64
        };
        SetCosts {
            case1: cost(Case::Case1),
            case2: cost(Case::Case2),
            case3: cost(Case::Case3),
            case4: cost(Case::Case4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::participant::{AsGroup, Asn, Participant};

    fn one_group_set(asn: u32) -> ParticipantSet {
        ParticipantSet::new(vec![AsGroup::new(
            Asn(asn),
            vec![Participant::new("p", vec!["1.1.1.1:0".to_string()])],
            vec![asn as u64],
        )])
    }

    #[test]
    fn test_applicability_follows_client_and_destination_sets() {
        let sets = MeasurementSets {
            c_as: one_group_set(1),
            g_as: one_group_set(2),
            g_as_r: one_group_set(3),
            e_as: one_group_set(4),
            e_as_r: one_group_set(5),
            ..MeasurementSets::default()
        };
        assert!(sets.is_applicable(Case::Case1));
        assert!(sets.is_applicable(Case::Case4));
        assert!(!sets.is_applicable(Case::Case2));
        assert!(!sets.is_applicable(Case::Case3));
    }

    #[test]
    fn test_theoretical_costs() {
        let sets = MeasurementSets {
            c_as: one_group_set(1),
            g_as: ParticipantSet::new(vec![
                one_group_set(2).groups.remove(0),
                one_group_set(3).groups.remove(0),
            ]),
            ..MeasurementSets::default()
        };
        let costs = sets.theoretical_costs();
        assert_eq!(costs.case1, 20 * 1 * 2);
        assert_eq!(costs.case2, 0);
        assert_eq!(costs.total(), 40);
    }
}
