//! 参与者集合模型
//!
//! 参与者按 AS 分组，每个参与者可能有多个 `ip:port` 形式的地址（带端口的 IPv6 带方括号）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// IP 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IpVersion {
    #[default]
    V4,
    V6,
}

impl IpVersion {
    /// 平台定义中使用的 `af` 字段
    pub fn af(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// 判断 `ip:port` 形式的地址是否属于该版本
    ///
    /// 去掉端口和方括号后按 IP 字面量判断；无法解析的主机名只归入 IPv4
    pub fn matches(self, address: &str) -> bool {
        TargetAddress::parse(address).is_some_and(|target| target.version() == Some(self))
    }
}

impl TryFrom<u8> for IpVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            other => Err(format!("不支持的 IP 版本: {}", other)),
        }
    }
}

impl From<IpVersion> for u8 {
    fn from(value: IpVersion) -> Self {
        value.af()
    }
}

impl FromStr for IpVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4" | "v4" | "ipv4" => Ok(IpVersion::V4),
            "6" | "v6" | "ipv6" => Ok(IpVersion::V6),
            other => Err(format!("不支持的 IP 版本: {}", other)),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.af())
    }
}

/// 自治系统编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Asn(pub u32);

impl Asn {
    /// 未知 AS（查找失败时的占位）
    pub const UNKNOWN: Asn = Asn(0);

    pub fn number(self) -> u32 {
        self.0
    }
}

impl FromStr for Asn {
    type Err = String;

    /// 支持 `AS3320`、`as3320` 和 `3320`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("AS")
            .or_else(|| trimmed.strip_prefix("as"))
            .unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .map(Asn)
            .map_err(|_| format!("无法解析 AS 编号: {}", s))
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Asn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Visitor;

        struct AsnVisitor;

        impl<'de> Visitor<'de> for AsnVisitor {
            type Value = Asn;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an AS number as string (\"AS123\") or integer")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(E::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(value).map(Asn).map_err(E::custom)
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(value).map(Asn).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AsnVisitor)
    }
}

/// 拆分后的目标地址
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetAddress {
    /// 不带方括号的 IP
    pub ip: String,
    /// 端口，`0` 或缺失时为 None
    pub port: Option<u16>,
}

impl TargetAddress {
    /// 解析 `ip:port` 形式，按最后一个冒号拆分，兼容 `[v6]:port`
    ///
    /// 没有端口的纯 IPv4 地址也可以接受；没有方括号的 IPv6 字面量视为不带端口
    pub fn parse(notation: &str) -> Option<Self> {
        let notation = notation.trim();
        if notation.is_empty() {
            return None;
        }

        let (host, port) = match notation.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') || host.ends_with(']') => (host, port),
            _ => (notation, ""),
        };

        let ip = host.trim_start_matches('[').trim_end_matches(']').to_string();
        if ip.is_empty() {
            return None;
        }

        let port = match port.parse::<u16>() {
            Ok(0) | Err(_) => None,
            Ok(p) => Some(p),
        };

        Some(Self { ip, port })
    }

    /// 地址所属的 IP 版本，既不是 IP 字面量也不像主机名时为 None
    pub fn version(&self) -> Option<IpVersion> {
        match self.ip.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => Some(IpVersion::V4),
            Ok(IpAddr::V6(_)) => Some(IpVersion::V6),
            Err(_) if !self.ip.contains(':') => Some(IpVersion::V4),
            Err(_) => None,
        }
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) if self.ip.contains(':') => write!(f, "[{}]:{}", self.ip, port),
            Some(port) => write!(f, "{}:{}", self.ip, port),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// 单个参与者（中继或终端）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// 标识（中继指纹或探针 ID）
    pub identifier: String,
    /// `ip:port` 形式的地址列表
    pub addresses: Vec<String>,
}

impl Participant {
    pub fn new(identifier: impl Into<String>, addresses: Vec<String>) -> Self {
        Self {
            identifier: identifier.into(),
            addresses,
        }
    }

    /// 选出指定 IP 版本的第一个地址
    pub fn address_for(&self, version: IpVersion) -> Option<TargetAddress> {
        self.addresses
            .iter()
            .filter(|a| version.matches(a))
            .find_map(|a| TargetAddress::parse(a))
    }
}

/// 同一个 AS 中的参与者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsGroup {
    pub asn: Asn,
    pub participants: Vec<Participant>,
    /// 位于该 AS 中的探针
    #[serde(default)]
    pub probes: Vec<u64>,
}

impl AsGroup {
    pub fn new(asn: Asn, participants: Vec<Participant>, probes: Vec<u64>) -> Self {
        Self {
            asn,
            participants,
            probes,
        }
    }
}

/// 按 AS 分组、保持顺序的参与者集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSet {
    pub groups: Vec<AsGroup>,
}

impl ParticipantSet {
    pub fn new(groups: Vec<AsGroup>) -> Self {
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// AS 分组数量
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// 所有分组的探针，按顺序展开
    pub fn probe_ids(&self) -> Vec<u64> {
        self.groups.iter().flat_map(|g| g.probes.iter().copied()).collect()
    }

    /// 所有参与者的所有地址，按顺序展开
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.participants.iter())
            .flat_map(|p| p.addresses.iter().map(String::as_str))
    }

    /// 丢弃在指定 IP 版本下没有可用地址的参与者，以及因此变空的分组
    ///
    /// 只有探针、没有参与者的分组保留（它们只作为请求方出现）
    pub fn retain_reachable(&mut self, version: IpVersion) {
        for group in &mut self.groups {
            group.participants.retain(|p| p.address_for(version).is_some());
        }
        self.groups
            .retain(|g| !g.participants.is_empty() || !g.probes.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v4_with_port() {
        let addr = TargetAddress::parse("185.81.215.146:9001").unwrap();
        assert_eq!(addr.ip, "185.81.215.146");
        assert_eq!(addr.port, Some(9001));
    }

    #[test]
    fn test_zero_port_means_no_port() {
        let addr = TargetAddress::parse("88.198.220.88:0").unwrap();
        assert_eq!(addr.port, None);
        assert_eq!(addr.to_string(), "88.198.220.88");
    }

    #[test]
    fn test_parse_bracketed_v6() {
        let addr = TargetAddress::parse("[2a01:4f8:fff0:4f:266:37ff:fe2c:5d19]:443").unwrap();
        assert_eq!(addr.ip, "2a01:4f8:fff0:4f:266:37ff:fe2c:5d19");
        assert_eq!(addr.port, Some(443));
        assert_eq!(addr.to_string(), "[2a01:4f8:fff0:4f:266:37ff:fe2c:5d19]:443");
    }

    #[test]
    fn test_parse_bare_addresses() {
        assert_eq!(TargetAddress::parse("10.0.0.1").unwrap().port, None);
        let v6 = TargetAddress::parse("2001:db8::1").unwrap();
        assert_eq!(v6.ip, "2001:db8::1");
        assert_eq!(v6.port, None);
        assert!(TargetAddress::parse("  ").is_none());
    }

    #[test]
    fn test_address_for_selects_family() {
        let p = Participant::new(
            "FP1",
            vec!["1.2.3.4:9001".to_string(), "[2001:db8::1]:9001".to_string()],
        );
        assert_eq!(p.address_for(IpVersion::V4).unwrap().ip, "1.2.3.4");
        assert_eq!(p.address_for(IpVersion::V6).unwrap().ip, "2001:db8::1");

        let v4_only = Participant::new("FP2", vec!["1.2.3.4:9001".to_string()]);
        assert!(v4_only.address_for(IpVersion::V6).is_none());
    }

    #[test]
    fn test_bare_v6_literal_is_v6() {
        let bare = Participant::new("FP3", vec!["2001:db8::1".to_string()]);
        assert!(bare.address_for(IpVersion::V4).is_none());
        let addr = bare.address_for(IpVersion::V6).unwrap();
        assert_eq!(addr.ip, "2001:db8::1");
        assert_eq!(addr.port, None);

        let mixed = Participant::new(
            "FP4",
            vec!["2001:db8::2".to_string(), "192.0.2.7:443".to_string()],
        );
        assert_eq!(mixed.address_for(IpVersion::V4).unwrap().ip, "192.0.2.7");
        assert_eq!(mixed.address_for(IpVersion::V6).unwrap().ip, "2001:db8::2");

        assert_eq!(TargetAddress::parse("[::1]:80").unwrap().version(), Some(IpVersion::V6));
        assert_eq!(TargetAddress::parse("example.org:80").unwrap().version(), Some(IpVersion::V4));
    }

    #[test]
    fn test_asn_parsing() {
        assert_eq!("AS3320".parse::<Asn>().unwrap(), Asn(3320));
        assert_eq!("3320".parse::<Asn>().unwrap(), Asn(3320));
        assert!("ASX".parse::<Asn>().is_err());
        let from_int: Asn = serde_json::from_str("680").unwrap();
        let from_str: Asn = serde_json::from_str("\"AS680\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_int.to_string(), "AS680");
    }

    #[test]
    fn test_retain_reachable_drops_unusable_members() {
        let mut set = ParticipantSet::new(vec![
            AsGroup::new(
                Asn(1),
                vec![Participant::new("a", vec!["[2001:db8::1]:1".to_string()])],
                vec![],
            ),
            AsGroup::new(
                Asn(2),
                vec![Participant::new("b", vec!["1.1.1.1:1".to_string()])],
                vec![],
            ),
            AsGroup::new(Asn(3), vec![], vec![42]),
        ]);
        set.retain_reachable(IpVersion::V4);
        let asns: Vec<Asn> = set.groups.iter().map(|g| g.asn).collect();
        assert_eq!(asns, vec![Asn(2), Asn(3)]);
    }
}
