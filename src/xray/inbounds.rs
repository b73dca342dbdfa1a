use std::collections::BTreeMap;

use serde::Serialize;

use crate::common::PanelError;
use crate::model::{Inbound, Protocol, Transport, User};

/// 管理 API 入站的固定 tag
pub const API_TAG: &str = "api";

/// Xray 入站对象
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundConfig {
    pub tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub listen: String,
    pub port: u16,
    pub protocol: String,
    pub settings: InboundSettings,
    #[serde(rename = "streamSettings", skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sniffing: Option<SniffingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InboundSettings {
    Vless {
        clients: Vec<VlessClient>,
        decryption: String,
    },
    Trojan {
        clients: Vec<TrojanClient>,
    },
    DokodemoDoor {
        address: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VlessClient {
    pub id: String,
    pub email: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrojanClient {
    pub password: String,
    pub email: String,
    pub level: u32,
}

/// 传输层设置；入站只会填充三种传输块之一
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamSettings {
    pub network: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub security: String,
    #[serde(rename = "tlsSettings", skip_serializing_if = "Option::is_none")]
    pub tls_settings: Option<TlsSettings>,
    #[serde(rename = "xhttpSettings", skip_serializing_if = "Option::is_none")]
    pub xhttp_settings: Option<XhttpSettings>,
    #[serde(rename = "grpcSettings", skip_serializing_if = "Option::is_none")]
    pub grpc_settings: Option<GrpcSettings>,
    #[serde(rename = "wsSettings", skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsSettings {
    #[serde(rename = "serverName", skip_serializing_if = "String::is_empty")]
    pub server_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XhttpSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrpcSettings {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "multiMode")]
    pub multi_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SniffingConfig {
    pub enabled: bool,
    #[serde(rename = "destOverride")]
    pub dest_override: Vec<String>,
    #[serde(rename = "routeOnly")]
    pub route_only: bool,
}

impl SniffingConfig {
    fn route_only() -> Self {
        Self {
            enabled: true,
            dest_override: ["http", "tls", "quic", "fakedns"]
                .into_iter()
                .map(String::from)
                .collect(),
            route_only: true,
        }
    }
}

/// 本地管理 API 入站（dokodemo-door）
pub fn api_inbound(api_port: u16) -> InboundConfig {
    InboundConfig {
        tag: API_TAG.to_string(),
        listen: "127.0.0.1".to_string(),
        port: api_port,
        protocol: "dokodemo-door".to_string(),
        settings: InboundSettings::DokodemoDoor {
            address: "127.0.0.1".to_string(),
        },
        stream_settings: None,
        sniffing: None,
    }
}

/// 为一个启用的入站构建配置对象
///
/// `active_users` 已经过滤为活跃用户。协议或传输层无法识别时返回
/// [`PanelError::Assembly`]，整份文档随之作废。
pub fn build_inbound(
    inbound: &Inbound,
    active_users: &[&User],
    sniffing: bool,
) -> Result<InboundConfig, PanelError> {
    let settings = match &inbound.protocol {
        Protocol::Vless => InboundSettings::Vless {
            clients: active_users
                .iter()
                .map(|u| VlessClient {
                    id: u.uuid.clone(),
                    email: u.email.clone(),
                    level: 0,
                })
                .collect(),
            decryption: "none".to_string(),
        },
        // Trojan 密码直接复用用户 UUID
        Protocol::Trojan => InboundSettings::Trojan {
            clients: active_users
                .iter()
                .map(|u| TrojanClient {
                    password: u.uuid.clone(),
                    email: u.email.clone(),
                    level: 0,
                })
                .collect(),
        },
        Protocol::Other(p) => {
            return Err(PanelError::assembly(
                &inbound.tag,
                format!("unsupported protocol: {}", p),
            ))
        }
    };

    Ok(InboundConfig {
        tag: inbound.tag.clone(),
        listen: inbound.listen.clone(),
        port: inbound.port,
        protocol: inbound.protocol.to_string(),
        settings,
        stream_settings: Some(build_stream_settings(inbound)?),
        sniffing: sniffing.then(SniffingConfig::route_only),
    })
}

fn build_stream_settings(inbound: &Inbound) -> Result<StreamSettings, PanelError> {
    let mut stream = match &inbound.transport {
        Transport::Xhttp => StreamSettings {
            network: "xhttp".to_string(),
            xhttp_settings: Some(XhttpSettings {
                path: inbound.path.clone(),
                host: inbound.host.clone(),
                mode: if inbound.mode.is_empty() {
                    "auto".to_string()
                } else {
                    inbound.mode.clone()
                },
            }),
            ..Default::default()
        },
        Transport::Grpc => StreamSettings {
            network: "grpc".to_string(),
            grpc_settings: Some(GrpcSettings {
                service_name: inbound.service_name.clone(),
                multi_mode: true,
            }),
            ..Default::default()
        },
        Transport::Ws => {
            let mut headers = BTreeMap::new();
            if !inbound.host.is_empty() {
                headers.insert("Host".to_string(), inbound.host.clone());
            }
            StreamSettings {
                network: "ws".to_string(),
                ws_settings: Some(WsSettings {
                    path: inbound.path.clone(),
                    headers,
                }),
                ..Default::default()
            }
        }
        Transport::Other(t) => {
            return Err(PanelError::assembly(
                &inbound.tag,
                format!("unsupported transport: {}", t),
            ))
        }
    };
    // TLS 由 nginx 终结
    stream.security = "none".to_string();
    Ok(stream)
}
