use serde::Serialize;
use tracing::debug;

use super::inbounds::{StreamSettings, TlsSettings};
use crate::model::{Outbound, OutboundType};

pub const DIRECT_TAG: &str = "direct";
pub const BLOCK_TAG: &str = "block";

const DEFAULT_WG_MTU: u32 = 1420;

/// Xray 出站对象
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundConfig {
    pub tag: String,
    pub protocol: String,
    pub settings: OutboundSettings,
    #[serde(rename = "streamSettings", skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundSettings {
    Freedom {
        #[serde(rename = "domainStrategy")]
        domain_strategy: String,
    },
    Blackhole {
        response: BlackholeResponse,
    },
    WireGuard {
        #[serde(rename = "secretKey")]
        secret_key: String,
        address: Vec<String>,
        peers: Vec<WireGuardPeer>,
        reserved: [u8; 3],
        mtu: u32,
    },
    Servers {
        servers: Vec<ServerEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlackholeResponse {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireGuardPeer {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub endpoint: String,
}

/// SOCKS / Trojan 的上游服务器
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEntry {
    pub address: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<SocksUser>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocksUser {
    pub user: String,
    pub pass: String,
}

/// 默认直连出站，始终排在第一位
pub fn direct_outbound() -> OutboundConfig {
    freedom(DIRECT_TAG)
}

/// 黑洞出站，返回 HTTP 403 风格的响应
pub fn block_outbound() -> OutboundConfig {
    blackhole(BLOCK_TAG)
}

fn freedom(tag: &str) -> OutboundConfig {
    OutboundConfig {
        tag: tag.to_string(),
        protocol: "freedom".to_string(),
        settings: OutboundSettings::Freedom {
            domain_strategy: "UseIPv4".to_string(),
        },
        stream_settings: None,
    }
}

fn blackhole(tag: &str) -> OutboundConfig {
    OutboundConfig {
        tag: tag.to_string(),
        protocol: "blackhole".to_string(),
        settings: OutboundSettings::Blackhole {
            response: BlackholeResponse {
                kind: "http".to_string(),
            },
        },
        stream_settings: None,
    }
}

/// 将存储中的出站转换为 Xray 出站对象
pub fn build_outbound(outbound: &Outbound) -> OutboundConfig {
    match outbound.kind {
        OutboundType::Direct => freedom(&outbound.tag),
        OutboundType::Blackhole => blackhole(&outbound.tag),
        OutboundType::WireGuard => wireguard(outbound),
        OutboundType::Socks5 => socks(outbound),
        OutboundType::Trojan => trojan(outbound),
    }
}

fn wireguard(outbound: &Outbound) -> OutboundConfig {
    let s = &outbound.settings;

    let endpoint = if s.port > 0 {
        format!("{}:{}", s.server, s.port)
    } else {
        s.server.clone()
    };

    let address = [&s.wg_local_ipv4, &s.wg_local_ipv6]
        .into_iter()
        .filter(|a| !a.is_empty())
        .cloned()
        .collect();

    let mtu = if s.wg_mtu == 0 { DEFAULT_WG_MTU } else { s.wg_mtu };

    OutboundConfig {
        tag: outbound.tag.clone(),
        protocol: "wireguard".to_string(),
        settings: OutboundSettings::WireGuard {
            secret_key: s.wg_secret_key.clone(),
            address,
            peers: vec![WireGuardPeer {
                public_key: s.wg_public_key.clone(),
                endpoint,
            }],
            reserved: parse_reserved(&s.wg_reserved),
            mtu,
        },
        stream_settings: None,
    }
}

/// 解析 WireGuard reserved 字节
///
/// 接受 JSON 数组 `[1, 2, 3]` 或逗号分隔 `1,2,3`；
/// 任何解析失败或长度不为 3 都回退到 `[0, 0, 0]`。
pub fn parse_reserved(raw: &str) -> [u8; 3] {
    let raw = raw.trim();
    if raw.is_empty() {
        return [0; 3];
    }

    if let Ok(values) = serde_json::from_str::<Vec<u8>>(raw) {
        if let Ok(reserved) = <[u8; 3]>::try_from(values) {
            return reserved;
        }
    }

    let parts: Vec<&str> = raw
        .trim_matches(|c| c == '[' || c == ']' || c == ' ')
        .split(',')
        .collect();
    if parts.len() != 3 {
        debug!(reserved = raw, "reserved bytes not a 3-tuple, using zeros");
        return [0; 3];
    }

    let mut reserved = [0u8; 3];
    for (slot, part) in reserved.iter_mut().zip(parts) {
        match part.trim().parse::<u8>() {
            Ok(v) => *slot = v,
            Err(_) => {
                debug!(reserved = raw, "unparseable reserved bytes, using zeros");
                return [0; 3];
            }
        }
    }
    reserved
}

fn socks(outbound: &Outbound) -> OutboundConfig {
    let s = &outbound.settings;
    let users = (!s.username.is_empty()).then(|| {
        vec![SocksUser {
            user: s.username.clone(),
            pass: s.password.clone(),
        }]
    });

    OutboundConfig {
        tag: outbound.tag.clone(),
        protocol: "socks".to_string(),
        settings: OutboundSettings::Servers {
            servers: vec![ServerEntry {
                address: s.server.clone(),
                port: s.port,
                password: None,
                users,
            }],
        },
        stream_settings: None,
    }
}

fn trojan(outbound: &Outbound) -> OutboundConfig {
    let s = &outbound.settings;

    // 只有配置了 SNI 或非 tcp 的传输时才附带 TLS/传输设置
    let custom_network = !s.trojan_network.is_empty() && !s.trojan_network.eq_ignore_ascii_case("tcp");
    let stream_settings = (!s.trojan_sni.is_empty() || custom_network).then(|| StreamSettings {
        network: if custom_network {
            s.trojan_network.clone()
        } else {
            "tcp".to_string()
        },
        security: "tls".to_string(),
        tls_settings: (!s.trojan_sni.is_empty()).then(|| TlsSettings {
            server_name: s.trojan_sni.clone(),
        }),
        ..Default::default()
    });

    OutboundConfig {
        tag: outbound.tag.clone(),
        protocol: "trojan".to_string(),
        settings: OutboundSettings::Servers {
            servers: vec![ServerEntry {
                address: s.server.clone(),
                port: s.port,
                password: Some(s.trojan_password.clone()),
                users: None,
            }],
        },
        stream_settings,
    }
}
