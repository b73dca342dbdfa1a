use std::fmt;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::Domain;

/// 代理协议；无法识别的取值原样保留，由配置组装阶段报错
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    #[default]
    Vless,
    Trojan,
    Other(String),
}

impl From<String> for Protocol {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "vless" => Protocol::Vless,
            "trojan" => Protocol::Trojan,
            _ => Protocol::Other(s),
        }
    }
}

impl From<Protocol> for String {
    fn from(p: Protocol) -> Self {
        p.to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Vless => write!(f, "vless"),
            Protocol::Trojan => write!(f, "trojan"),
            Protocol::Other(s) => write!(f, "{}", s),
        }
    }
}

/// 传输层，三种都可以被 nginx 反代
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Transport {
    Ws,
    Grpc,
    Xhttp,
    Other(String),
}

impl From<String> for Transport {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Transport::Ws,
            "grpc" => Transport::Grpc,
            "xhttp" => Transport::Xhttp,
            _ => Transport::Other(s),
        }
    }
}

impl From<Transport> for String {
    fn from(t: Transport) -> Self {
        t.to_string()
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Ws => write!(f, "ws"),
            Transport::Grpc => write!(f, "grpc"),
            Transport::Xhttp => write!(f, "xhttp"),
            Transport::Other(s) => write!(f, "{}", s),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

/// Xray 入站定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    pub id: String,
    pub tag: String,
    #[serde(default)]
    pub protocol: Protocol,
    pub transport: Transport,
    pub port: u16,
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub domain_id: Option<String>,
    /// 由快照按 `domain_id` 解析得到，不写回存储
    #[serde(default, skip_serializing)]
    pub domain: Option<Domain>,

    /// ws / xhttp 路径
    #[serde(default)]
    pub path: String,
    /// gRPC 服务名
    #[serde(default)]
    pub service_name: String,
    /// ws / xhttp Host 头
    #[serde(default)]
    pub host: String,
    /// xhttp 模式：auto / packet-up / stream-up
    #[serde(default)]
    pub mode: String,

    /// 实际可达的主机名；通配符证书下为分配的子域名
    #[serde(default)]
    pub actual_domain: Option<String>,

    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub remark: String,
}

impl Inbound {
    /// 创建入站并分配 id、默认 tag；ws / xhttp 自动生成随机路径
    pub fn new(protocol: Protocol, transport: Transport, port: u16) -> Self {
        let id = Uuid::new_v4().to_string();
        let tag = format!("inbound-{}", &id[..8]);
        let path = match transport {
            Transport::Ws | Transport::Xhttp => random_path(),
            _ => String::new(),
        };
        Self {
            id,
            tag,
            protocol,
            transport,
            port,
            listen: default_listen(),
            domain_id: None,
            domain: None,
            path,
            service_name: String::new(),
            host: String::new(),
            mode: String::new(),
            actual_domain: None,
            enabled: true,
            remark: String::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn is_grpc(&self) -> bool {
        self.transport == Transport::Grpc
    }

    pub fn is_xhttp(&self) -> bool {
        self.transport == Transport::Xhttp
    }

    pub fn is_ws(&self) -> bool {
        self.transport == Transport::Ws
    }

    /// 反代文件所用的主机名：优先 `actual_domain`，否则绑定域名的原始主机名
    pub fn effective_domain(&self) -> Option<&str> {
        match self.actual_domain.as_deref() {
            Some(actual) if !actual.is_empty() => Some(actual),
            _ => self.domain.as_ref().map(|d| d.hostname.as_str()),
        }
    }
}

/// 10000-59999 之间的随机端口
pub fn random_port() -> u16 {
    OsRng.gen_range(10_000..60_000)
}

/// `/` 加 16 位十六进制的随机路径
pub fn random_path() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("/{}", hex)
}
