use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 出站类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundType {
    Direct,
    /// 转到本地其他代理
    Socks5,
    /// WARP、Proton VPN 等
    WireGuard,
    /// 自己的其他服务器，用作落地 IP
    Trojan,
    Blackhole,
}

impl fmt::Display for OutboundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundType::Direct => write!(f, "direct"),
            OutboundType::Socks5 => write!(f, "socks5"),
            OutboundType::WireGuard => write!(f, "wireguard"),
            OutboundType::Trojan => write!(f, "trojan"),
            OutboundType::Blackhole => write!(f, "blackhole"),
        }
    }
}

/// 按类型使用的设置字段，未用到的保持为空
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,

    pub wg_secret_key: String,
    pub wg_public_key: String,
    /// JSON 数组 `[1,2,3]` 或逗号分隔 `1,2,3`
    pub wg_reserved: String,
    pub wg_local_ipv4: String,
    pub wg_local_ipv6: String,
    /// 0 = 默认 1420
    pub wg_mtu: u32,

    pub trojan_password: String,
    pub trojan_sni: String,
    /// tcp / ws / grpc
    pub trojan_network: String,
}

/// Xray 出站定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub id: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: OutboundType,
    #[serde(flatten)]
    pub settings: OutboundSettings,
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    /// 同类出站之间的偏好，越大越优先
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub remark: String,
}

impl Outbound {
    /// 创建出站，默认 tag 为 `<type>-<id 前 8 位>`
    pub fn new(kind: OutboundType) -> Self {
        let id = Uuid::new_v4().to_string();
        let tag = format!("{}-{}", kind, &id[..8]);
        Self {
            id,
            tag,
            kind,
            settings: OutboundSettings::default(),
            enabled: true,
            priority: 0,
            remark: String::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_settings(mut self, settings: OutboundSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
