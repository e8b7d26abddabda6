use crate::models::measurement_sets::MeasurementSets;
use crate::models::participant::{AsGroup, Asn, Participant, ParticipantSet};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tokio::fs;

/// 终端集合：探针、地址、AS 三个平行数组
#[derive(Debug, Deserialize)]
struct RawEndpointSet {
    probes: Vec<u64>,
    addresses: Vec<String>,
    #[serde(default)]
    asn: Vec<Asn>,
}

/// 中继集合中的一个 AS
#[derive(Debug, Deserialize)]
struct RawAsEntry {
    #[serde(default)]
    relays: Vec<RawRelay>,
    #[serde(default)]
    ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRelay {
    fingerprint: String,
    #[serde(deserialize_with = "deserialize_addresses")]
    or_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSet {
    Endpoint(RawEndpointSet),
    Relay(Map<String, Value>),
}

/// 解析集合 JSON（终端集合或按 AS 分组的中继集合）
pub fn parse_participant_set(content: &str) -> serde_json::Result<ParticipantSet> {
    match serde_json::from_str::<RawSet>(content)? {
        RawSet::Endpoint(raw) => Ok(endpoint_set(raw)),
        RawSet::Relay(map) => relay_set(map),
    }
}

fn endpoint_set(raw: RawEndpointSet) -> ParticipantSet {
    let aligned = !raw.asn.is_empty()
        && raw.asn.len() == raw.probes.len()
        && raw.asn.len() == raw.addresses.len();

    if !aligned {
        // AS 信息缺失或不对齐时整体归入一个未知 AS
        let participants = raw
            .addresses
            .iter()
            .map(|a| Participant::new(a.clone(), vec![a.clone()]))
            .collect();
        return ParticipantSet::new(vec![AsGroup::new(Asn::UNKNOWN, participants, raw.probes)]);
    }

    let mut groups: Vec<AsGroup> = Vec::new();
    for ((asn, probe), address) in raw.asn.into_iter().zip(raw.probes).zip(raw.addresses) {
        let participant = Participant::new(probe.to_string(), vec![address]);
        match groups.iter_mut().find(|g| g.asn == asn) {
            Some(group) => {
                group.participants.push(participant);
                group.probes.push(probe);
            }
            None => groups.push(AsGroup::new(asn, vec![participant], vec![probe])),
        }
    }
    ParticipantSet::new(groups)
}

fn relay_set(map: Map<String, Value>) -> serde_json::Result<ParticipantSet> {
    let mut groups = Vec::with_capacity(map.len());
    for (key, value) in map {
        let asn: Asn = key.parse().map_err(serde::de::Error::custom)?;
        let entry: RawAsEntry = serde_json::from_value(value)?;
        let participants = entry
            .relays
            .into_iter()
            .map(|r| Participant::new(r.fingerprint, r.or_addresses))
            .collect();
        groups.push(AsGroup::new(asn, participants, entry.ids));
    }
    Ok(ParticipantSet::new(groups))
}

/// `or_addresses` 可能是单个字符串，也可能是列表
fn deserialize_addresses<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};

    struct AddressesVisitor;

    impl<'de> Visitor<'de> for AddressesVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an address string or a list of address strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut addresses = Vec::new();
            while let Some(address) = seq.next_element::<String>()? {
                addresses.push(address);
            }
            Ok(addresses)
        }
    }

    deserializer.deserialize_any(AddressesVisitor)
}

/// 从 JSON 文件加载单个集合
pub async fn load_participant_set(path: &Path) -> Result<ParticipantSet> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取集合文件: {}", path.display()))?;

    parse_participant_set(&content)
        .with_context(|| format!("无法解析集合文件: {}", path.display()))
}

/// 从目录加载全部集合，缺失的文件视为空集合
pub async fn load_measurement_sets(dir: &Path) -> Result<MeasurementSets> {
    if !dir.is_dir() {
        anyhow::bail!("集合目录不存在: {}", dir.display());
    }

    let mut loaded = Vec::with_capacity(MeasurementSets::FILE_NAMES.len());
    for name in MeasurementSets::FILE_NAMES {
        let path = dir.join(format!("{}.json", name));
        let set = if path.is_file() {
            let set = load_participant_set(&path).await?;
            tracing::info!("正在加载: {} ({} 个 AS)", name, set.len());
            set
        } else {
            tracing::info!("集合 {} 不存在，视为空集合", name);
            ParticipantSet::default()
        };
        loaded.push(set);
    }

    let mut it = loaded.into_iter();
    let mut next = || it.next().unwrap_or_default();
    Ok(MeasurementSets {
        c_as: next(),
        d_as: next(),
        g_as: next(),
        e_as: next(),
        g_as_r: next(),
        e_as_r: next(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_set_groups_by_asn() {
        let set = parse_participant_set(
            r#"{
                "probes": [10188, 31727, 10838],
                "addresses": ["217.240.17.218:0", "5.147.65.89:0", "90.187.19.21:0"],
                "asn": ["AS3320", "AS6830", "AS3320"]
            }"#,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.groups[0].asn, Asn(3320));
        assert_eq!(set.groups[0].probes, vec![10188, 10838]);
        assert_eq!(set.probe_ids(), vec![10188, 10838, 31727]);
    }

    #[test]
    fn test_parse_endpoint_set_without_asn() {
        let set = parse_participant_set(
            r#"{"probes": [50609], "addresses": ["88.198.220.88:0"]}"#,
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.groups[0].asn, Asn::UNKNOWN);
        assert_eq!(set.addresses().collect::<Vec<_>>(), vec!["88.198.220.88:0"]);
    }

    #[test]
    fn test_parse_relay_set_keeps_file_order() {
        let set = parse_participant_set(
            r#"{
                "AS9000": {"relays": [{"fingerprint": "AAA", "or_addresses": "1.1.1.1:9001"}], "ids": [7]},
                "AS100": {"relays": [{"fingerprint": "BBB", "or_addresses": ["2.2.2.2:443", "[2001:db8::2]:443"]}]}
            }"#,
        )
        .unwrap();
        let asns: Vec<u32> = set.groups.iter().map(|g| g.asn.number()).collect();
        assert_eq!(asns, vec![9000, 100]);
        assert_eq!(set.groups[0].probes, vec![7]);
        assert_eq!(set.groups[1].participants[0].addresses.len(), 2);
    }

    #[test]
    fn test_empty_object_is_empty_set() {
        assert!(parse_participant_set("{}").unwrap().is_empty());
    }

    #[test]
    fn test_bad_asn_key_is_rejected() {
        assert!(parse_participant_set(r#"{"not-an-as": {"relays": []}}"#).is_err());
    }

    #[tokio::test]
    async fn test_missing_files_load_as_empty_sets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("c_as.json"),
            r#"{"probes": [1], "addresses": ["1.1.1.1:0"]}"#,
        )
        .unwrap();

        let sets = load_measurement_sets(dir.path()).await.unwrap();
        assert_eq!(sets.c_as.len(), 1);
        assert!(sets.d_as.is_empty());
        assert!(sets.g_as.is_empty());
    }
}
