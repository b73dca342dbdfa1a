use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 路由规则类型：每条规则只匹配一种条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Inbound,
    Domain,
    Ip,
    GeoSite,
    GeoIp,
    Protocol,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleType::Inbound => "inbound",
            RuleType::Domain => "domain",
            RuleType::Ip => "ip",
            RuleType::GeoSite => "geosite",
            RuleType::GeoIp => "geoip",
            RuleType::Protocol => "protocol",
        };
        write!(f, "{}", s)
    }
}

fn default_priority() -> i32 {
    100
}

/// 存储中的路由规则
///
/// 按 `kind` 只使用下列字段之一：
/// - inbound:  `inbound_tag`（单个入站 tag）
/// - domain:   `domains`（逗号分隔，如 `domain:example.com,full:www.example.com`）
/// - ip:       `ips`（逗号分隔 IP/CIDR）
/// - geosite:  `geosite_tags`（逗号分隔，如 `category-ads,cn`）
/// - geoip:    `geoip_codes`（逗号分隔，如 `cn,private`）
/// - protocol: `protocols`（逗号分隔，如 `bittorrent`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RuleType,

    #[serde(default)]
    pub inbound_tag: String,
    #[serde(default)]
    pub domains: String,
    #[serde(default)]
    pub ips: String,
    #[serde(default)]
    pub geosite_tags: String,
    #[serde(default)]
    pub geoip_codes: String,
    #[serde(default)]
    pub protocols: String,

    pub outbound_tag: String,
    /// 越小越先匹配
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub remark: String,
}

impl RoutingRule {
    pub fn new(name: impl Into<String>, kind: RuleType, outbound_tag: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            inbound_tag: String::new(),
            domains: String::new(),
            ips: String::new(),
            geosite_tags: String::new(),
            geoip_codes: String::new(),
            protocols: String::new(),
            outbound_tag: outbound_tag.into(),
            priority: default_priority(),
            enabled: true,
            remark: String::new(),
        }
    }

    /// 写入与类型对应的条件字段
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.kind {
            RuleType::Inbound => self.inbound_tag = value,
            RuleType::Domain => self.domains = value,
            RuleType::Ip => self.ips = value,
            RuleType::GeoSite => self.geosite_tags = value,
            RuleType::GeoIp => self.geoip_codes = value,
            RuleType::Protocol => self.protocols = value,
        }
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    /// 与类型对应的条件字段原值
    pub fn value(&self) -> &str {
        match self.kind {
            RuleType::Inbound => &self.inbound_tag,
            RuleType::Domain => &self.domains,
            RuleType::Ip => &self.ips,
            RuleType::GeoSite => &self.geosite_tags,
            RuleType::GeoIp => &self.geoip_codes,
            RuleType::Protocol => &self.protocols,
        }
    }
}

/// 初始化时写入的基础规则
pub fn default_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule::new("Block ad domains", RuleType::GeoSite, "block")
            .with_value("category-ads,category-ads-all")
            .with_priority(10)
            .with_remark("Block common advertising and tracking domains"),
        RoutingRule::new("Block BitTorrent", RuleType::Protocol, "block")
            .with_value("bittorrent")
            .with_priority(20)
            .with_remark("Reject BitTorrent traffic"),
        RoutingRule::new("Private networks direct", RuleType::GeoIp, "direct")
            .with_value("private")
            .with_priority(90)
            .with_remark("LAN and private addresses go out directly"),
    ]
}

/// 可供快速导入的预设模板名
pub const PRESET_NAMES: [&str; 3] = ["warp-china", "warp-streaming", "china-direct"];

/// 预设规则模板；`warp-*` 需要先创建 tag 为 `warp` 的出站
pub fn preset_rules(name: &str) -> Option<Vec<RoutingRule>> {
    let rules = match name {
        "warp-china" => vec![
            RoutingRule::new("China sites via WARP", RuleType::GeoSite, "warp")
                .with_value("cn,geolocation-cn")
                .with_priority(50),
            RoutingRule::new("China IPs via WARP", RuleType::GeoIp, "warp")
                .with_value("cn")
                .with_priority(51),
        ],
        "warp-streaming" => vec![RoutingRule::new(
            "Streaming via WARP",
            RuleType::GeoSite,
            "warp",
        )
        .with_value("netflix,disney,youtube,spotify,hulu,hbo,primevideo")
        .with_priority(60)],
        "china-direct" => vec![
            RoutingRule::new("China sites direct", RuleType::GeoSite, "direct")
                .with_value("cn,geolocation-cn")
                .with_priority(50),
            RoutingRule::new("China IPs direct", RuleType::GeoIp, "direct")
                .with_value("cn")
                .with_priority(51),
        ],
        _ => return None,
    };
    Some(rules)
}
