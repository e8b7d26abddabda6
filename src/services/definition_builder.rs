//! 测量定义构建服务 - 业务能力层
//!
//! 只负责"把参与者集合变成批次定义"，不提交、不关心配额

use crate::config::Config;
use crate::models::{
    Asn, Case, CaseShape, IpVersion, MeasurementBatch, MeasurementDefinition, MeasurementSets,
    ParticipantSet, ProbeSelector, TargetAddress,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// 测量定义构建服务
///
/// 职责：
/// - fan-out：一组探针测量多个目标，按 `chunk_size` 切分
/// - fan-in：每个 AS 一个探针测量少量目标，单个批次
/// - 不发请求
/// - 空输入返回空列表（场景不适用）
#[derive(Debug, Clone)]
pub struct DefinitionBuilder {
    chunk_size: usize,
    max_elements: usize,
    ip_version: IpVersion,
}

impl DefinitionBuilder {
    pub fn new(chunk_size: usize, max_elements: usize, ip_version: IpVersion) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_elements,
            ip_version,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.chunk_size,
            config.max_elements_per_case,
            config.ip_version,
        )
    }

    /// 按场景结构构建该场景的全部批次
    ///
    /// # 参数
    /// - `case`: 场景
    /// - `sets`: 本次运行的参与者集合
    /// - `run_name`: 运行名称，用于生成测量描述
    ///
    /// # 返回
    /// 返回批次列表，场景不适用时为空
    pub fn build_case(&self, case: Case, sets: &MeasurementSets, run_name: &str) -> Vec<MeasurementBatch> {
        let (origin, target) = sets.origin_and_target(case);
        let description = case.description(run_name);
        match case.shape() {
            CaseShape::FanOut => self.build_fan_out(origin, target, &description),
            CaseShape::FanIn => self.build_fan_in(origin, target, &description),
        }
    }

    /// 构建 fan-out 批次
    ///
    /// 每个目标 AS 贡献一个测量（取第一个有可用地址的参与者），
    /// 每个批次使用同一个 `probes` 选择器，包含请求方集合的全部探针
    pub fn build_fan_out(
        &self,
        origin: &ParticipantSet,
        target: &ParticipantSet,
        description: &str,
    ) -> Vec<MeasurementBatch> {
        if origin.is_empty() || target.is_empty() {
            return Vec::new();
        }

        let probes = origin.probe_ids();
        if probes.is_empty() {
            warn!("⚠️ 请求方集合没有任何探针，跳过 {}", description);
            return Vec::new();
        }
        let selector = ProbeSelector::probe_list(&probes);

        if target.len() > self.max_elements {
            warn!(
                "⚠️ 目标数量 {} 超过上限，只保留前 {} 个",
                target.len(),
                self.max_elements
            );
        }

        let definitions: Vec<MeasurementDefinition> = target
            .groups
            .iter()
            .take(self.max_elements)
            .filter_map(|group| {
                let address = group
                    .participants
                    .iter()
                    .find_map(|p| p.address_for(self.ip_version));
                if address.is_none() {
                    warn!("⚠️ {} 没有可用的 {} 地址，跳过", group.asn, self.ip_version);
                }
                address
            })
            .map(|address| self.definition(&address, description))
            .collect();

        let batches: Vec<MeasurementBatch> = definitions
            .chunks(self.chunk_size)
            .map(|chunk| MeasurementBatch {
                definitions: chunk.to_vec(),
                probes: vec![selector.clone()],
                ..MeasurementBatch::default()
            })
            .collect();

        debug!(
            "{}: {} 个测量，切分为 {} 个批次",
            description,
            definitions.len(),
            batches.len()
        );
        batches
    }

    /// 构建 fan-in 批次
    ///
    /// 目标集合中每个不重复的地址一个测量，请求方每个 AS 一个 `asn` 选择器
    pub fn build_fan_in(
        &self,
        origin: &ParticipantSet,
        target: &ParticipantSet,
        description: &str,
    ) -> Vec<MeasurementBatch> {
        if origin.is_empty() || target.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut definitions = Vec::new();
        for participant in target.groups.iter().flat_map(|g| g.participants.iter()) {
            match participant.address_for(self.ip_version) {
                Some(address) => {
                    if seen.insert(address.clone()) {
                        definitions.push(self.definition(&address, description));
                    }
                }
                None => warn!(
                    "⚠️ {} 没有可用的 {} 地址，跳过",
                    participant.identifier, self.ip_version
                ),
            }
        }

        let probes: Vec<ProbeSelector> = origin
            .groups
            .iter()
            .filter(|g| g.asn != Asn::UNKNOWN)
            .map(|g| ProbeSelector::one_from_asn(g.asn.number()))
            .collect();

        if definitions.is_empty() || probes.is_empty() {
            warn!("⚠️ {} 没有可用的目标或请求方", description);
            return Vec::new();
        }

        vec![MeasurementBatch {
            definitions,
            probes,
            ..MeasurementBatch::default()
        }]
    }

    fn definition(&self, address: &TargetAddress, description: &str) -> MeasurementDefinition {
        MeasurementDefinition::traceroute(
            address.ip.clone(),
            address.port,
            self.ip_version.af(),
            description,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AsGroup, Participant, SelectorKind, SelectorValue};

    fn relay_group(asn: u32, address: &str) -> AsGroup {
        AsGroup::new(
            Asn(asn),
            vec![Participant::new(format!("FP{}", asn), vec![address.to_string()])],
            vec![],
        )
    }

    fn relay_set(n: u32) -> ParticipantSet {
        ParticipantSet::new(
            (1..=n)
                .map(|i| relay_group(i, &format!("10.0.{}.{}:9001", i / 256, i % 256)))
                .collect(),
        )
    }

    fn client_set(probes: &[u64]) -> ParticipantSet {
        ParticipantSet::new(vec![AsGroup::new(
            Asn::UNKNOWN,
            probes
                .iter()
                .map(|p| Participant::new(p.to_string(), vec![format!("192.0.2.{}:0", p)]))
                .collect(),
            probes.to_vec(),
        )])
    }

    #[test]
    fn test_fan_out_chunks_35_targets_into_30_and_5() {
        let builder = DefinitionBuilder::new(30, 1000, IpVersion::V4);
        let batches = builder.build_fan_out(&client_set(&[1, 2, 3]), &relay_set(35), "run-c1");

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].job_count(), 30);
        assert_eq!(batches[1].job_count(), 5);
        assert_eq!(batches[0].definitions[0].target, "10.0.0.1");
        assert_eq!(batches[1].definitions[4].target, "10.0.0.35");

        for batch in &batches {
            assert_eq!(batch.probes.len(), 1);
            assert_eq!(batch.probes[0].kind, SelectorKind::Probes);
            assert_eq!(batch.probes[0].requested, 3);
            assert_eq!(batch.probes[0].value, SelectorValue::List("1,2,3".to_string()));
            assert_eq!(batch.definitions[0].port, Some(9001));
            assert_eq!(batch.definitions[0].description, "run-c1");
        }
        assert_eq!(batches[1].estimated_cost(), 20 * 5 * 3);
    }

    #[test]
    fn test_fan_out_truncates_to_max_elements() {
        let builder = DefinitionBuilder::new(30, 50, IpVersion::V4);
        let batches = builder.build_fan_out(&client_set(&[1]), &relay_set(120), "run-c3");
        let total: usize = batches.iter().map(|b| b.job_count()).sum();
        assert_eq!(total, 50);
        assert!(batches.iter().all(|b| b.job_count() <= 30));
    }

    #[test]
    fn test_fan_in_one_selector_per_origin_as() {
        let builder = DefinitionBuilder::new(30, 1000, IpVersion::V4);
        let origin = ParticipantSet::new(vec![
            AsGroup::new(Asn(3320), vec![], vec![11]),
            AsGroup::new(Asn(6830), vec![], vec![12]),
            AsGroup::new(Asn(680), vec![], vec![13]),
        ]);
        let target = client_set(&[7, 8, 7]);

        let batches = builder.build_fan_in(&origin, &target, "run-c4");
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.job_count(), 2);
        assert_eq!(batch.definitions[0].port, None);
        assert_eq!(batch.probes.len(), 3);
        assert!(batch.probes.iter().all(|p| p.requested == 1 && p.kind == SelectorKind::Asn));
        assert_eq!(batch.probes[1].value, SelectorValue::Asn(6830));
        assert_eq!(batch.estimated_cost(), 20 * 2 * 3);
    }

    #[test]
    fn test_empty_sets_are_not_applicable() {
        let builder = DefinitionBuilder::new(30, 1000, IpVersion::V4);
        let empty = ParticipantSet::default();
        assert!(builder.build_fan_out(&empty, &relay_set(3), "x").is_empty());
        assert!(builder.build_fan_out(&client_set(&[1]), &empty, "x").is_empty());
        assert!(builder.build_fan_in(&empty, &relay_set(3), "x").is_empty());
        assert!(builder.build_fan_in(&relay_set(3), &empty, "x").is_empty());
    }

    #[test]
    fn test_v6_selects_bracketed_addresses() {
        let builder = DefinitionBuilder::new(30, 1000, IpVersion::V6);
        let target = ParticipantSet::new(vec![
            AsGroup::new(
                Asn(1),
                vec![Participant::new(
                    "FP1",
                    vec!["1.1.1.1:443".to_string(), "[2001:db8::1]:443".to_string()],
                )],
                vec![],
            ),
            relay_group(2, "2.2.2.2:443"),
        ]);
        let batches = builder.build_fan_out(&client_set(&[5]), &target, "run-c1");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].job_count(), 1);
        assert_eq!(batches[0].definitions[0].target, "2001:db8::1");
        assert_eq!(batches[0].definitions[0].af, 6);
    }

    #[test]
    fn test_bare_v6_target_follows_address_family() {
        let target = ParticipantSet::new(vec![
            relay_group(1, "2001:db8::1"),
            relay_group(2, "198.51.100.2:9001"),
        ]);

        let v4 = DefinitionBuilder::new(30, 1000, IpVersion::V4).build_fan_out(
            &client_set(&[5]),
            &target,
            "run-c1",
        );
        let v4_jobs: Vec<(&str, u8)> = v4[0]
            .definitions
            .iter()
            .map(|d| (d.target.as_str(), d.af))
            .collect();
        assert_eq!(v4_jobs, vec![("198.51.100.2", 4)]);

        let v6 = DefinitionBuilder::new(30, 1000, IpVersion::V6).build_fan_out(
            &client_set(&[5]),
            &target,
            "run-c1",
        );
        assert_eq!(v6[0].job_count(), 1);
        assert_eq!(v6[0].definitions[0].target, "2001:db8::1");
        assert_eq!(v6[0].definitions[0].af, 6);
    }

    #[test]
    fn test_build_case_uses_case_sets_and_description() {
        let builder = DefinitionBuilder::new(30, 1000, IpVersion::V4);
        let sets = MeasurementSets {
            c_as: client_set(&[1, 2]),
            g_as: relay_set(4),
            ..MeasurementSets::default()
        };
        let batches = builder.build_case(Case::Case1, &sets, "20240101-000000");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].definitions[0].description, "20240101-000000-c1");
        assert!(builder.build_case(Case::Case2, &sets, "r").is_empty());
    }
}
