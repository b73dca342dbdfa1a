use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::PanelError;

/// 域名用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainType {
    /// 直连，需要 TLS 证书
    #[default]
    Direct,
    /// CDN 前置（Cloudflare 等），需要 TLS 证书
    Cdn,
    /// Reality，不需要证书
    Reality,
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainType::Direct => write!(f, "direct"),
            DomainType::Cdn => write!(f, "cdn"),
            DomainType::Reality => write!(f, "reality"),
        }
    }
}

/// 代理连接使用的域名及其证书材料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    /// 主机名，可以是 `*.example.com` 形式的通配符
    #[serde(alias = "domain")]
    pub hostname: String,
    #[serde(rename = "type", default)]
    pub kind: DomainType,
    /// 导入证书时识别出的通配符标记
    #[serde(default)]
    pub is_wildcard: bool,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub cert_path: String,
    #[serde(default)]
    pub key_path: String,
    #[serde(default = "super::default_true")]
    pub enabled: bool,
}

fn hostname_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\*\.)?([a-zA-Z0-9]([a-zA-Z0-9\-]*[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$").ok()
    })
    .as_ref()
}

/// 校验主机名格式（允许 `*.` 前缀）
pub fn is_valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty()
        && hostname.len() <= 253
        && hostname_regex().is_some_and(|re| re.is_match(hostname))
}

impl Domain {
    /// 创建域名，拒绝格式错误的主机名
    pub fn new(hostname: impl Into<String>, kind: DomainType) -> Result<Self, PanelError> {
        let hostname = hostname.into();
        if !is_valid_hostname(&hostname) {
            return Err(PanelError::validation(format!(
                "malformed hostname '{}'",
                hostname
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            hostname,
            kind,
            is_wildcard: false,
            server_name: String::new(),
            fingerprint: String::new(),
            short_id: String::new(),
            private_key: String::new(),
            public_key: String::new(),
            cert_path: String::new(),
            key_path: String::new(),
            enabled: true,
        })
    }

    pub fn with_cert(mut self, cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        self.cert_path = cert_path.into();
        self.key_path = key_path.into();
        self
    }

    pub fn needs_cert(&self) -> bool {
        matches!(self.kind, DomainType::Direct | DomainType::Cdn)
    }

    pub fn is_reality(&self) -> bool {
        self.kind == DomainType::Reality
    }

    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard || self.hostname.starts_with("*.")
    }

    /// 去掉通配符前缀后的主机名
    pub fn base_hostname(&self) -> &str {
        self.hostname.strip_prefix("*.").unwrap_or(&self.hostname)
    }

    /// 在生成任何配置之前检查主机名与证书路径
    pub fn validate(&self) -> Result<(), PanelError> {
        if !is_valid_hostname(&self.hostname) {
            return Err(PanelError::validation(format!(
                "malformed hostname '{}'",
                self.hostname
            )));
        }
        if self.needs_cert() && (self.cert_path.trim().is_empty() || self.key_path.trim().is_empty())
        {
            return Err(PanelError::validation(format!(
                "domain '{}' ({}) is missing certificate paths",
                self.hostname, self.kind
            )));
        }
        Ok(())
    }
}
