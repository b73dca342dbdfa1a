//! Xray 配置文档合成
//!
//! 把面板快照（用户、入站、出站、路由规则）转换为 Xray 启动配置。
//! 任何一个入站组装失败都会让整份文档作废，Xray 无法部分应用配置。

pub mod inbounds;
pub mod outbounds;
pub mod routing;

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::managed::write_atomic;
use crate::common::PanelError;
use crate::config::XraySettings;
use crate::model::{Snapshot, User};

pub use inbounds::{api_inbound, build_inbound, InboundConfig, StreamSettings, API_TAG};
pub use outbounds::{
    block_outbound, build_outbound, direct_outbound, parse_reserved, OutboundConfig, BLOCK_TAG,
    DIRECT_TAG,
};
pub use routing::{compile_rule, compile_rules, RoutingConfig, RoutingDirective};

/// 完整的 Xray 配置文档
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XrayConfig {
    pub log: LogSection,
    pub api: ApiSection,
    pub dns: DnsSection,
    pub inbounds: Vec<InboundConfig>,
    pub outbounds: Vec<OutboundConfig>,
    pub routing: RoutingConfig,
    pub policy: PolicySection,
    pub stats: StatsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSection {
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiSection {
    pub tag: String,
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsSection {
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySection {
    pub levels: BTreeMap<String, PolicyLevel>,
    pub system: SystemPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyLevel {
    pub handshake: u32,
    pub conn_idle: u32,
    pub uplink_only: u32,
    pub downlink_only: u32,
    pub stats_user_uplink: bool,
    pub stats_user_downlink: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPolicy {
    pub stats_inbound_uplink: bool,
    pub stats_inbound_downlink: bool,
    pub stats_outbound_uplink: bool,
    pub stats_outbound_downlink: bool,
}

/// 空对象，只用于开启统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSection {}

impl XrayConfig {
    pub fn to_json_pretty(&self) -> Result<String, PanelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 原子写入配置文件
    pub fn write_to(&self, path: &Path) -> Result<(), PanelError> {
        let json = self.to_json_pretty()?;
        write_atomic(path, json.as_bytes())?;
        info!(
            path = %path.display(),
            inbounds = self.inbounds.len(),
            outbounds = self.outbounds.len(),
            rules = self.routing.rules.len(),
            "xray config written"
        );
        Ok(())
    }
}

fn policy() -> PolicySection {
    let mut levels = BTreeMap::new();
    levels.insert(
        "0".to_string(),
        PolicyLevel {
            handshake: 4,
            conn_idle: 300,
            uplink_only: 2,
            downlink_only: 5,
            stats_user_uplink: true,
            stats_user_downlink: true,
        },
    );
    PolicySection {
        levels,
        system: SystemPolicy {
            stats_inbound_uplink: true,
            stats_inbound_downlink: true,
            stats_outbound_uplink: true,
            stats_outbound_downlink: true,
        },
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 配置生成器：只持有生成参数，输入通过 [`Snapshot`] 显式传入
#[derive(Debug, Clone)]
pub struct Generator {
    api_port: u16,
    log_level: String,
    sniffing: bool,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            api_port: 10085,
            log_level: "warning".to_string(),
            sniffing: true,
        }
    }
}

impl Generator {
    pub fn new(settings: &XraySettings) -> Self {
        Self {
            api_port: settings.api_port,
            log_level: settings.log_level.clone(),
            sniffing: settings.sniffing,
        }
    }

    pub fn with_api_port(mut self, port: u16) -> Self {
        self.api_port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_sniffing(mut self, enabled: bool) -> Self {
        self.sniffing = enabled;
        self
    }

    pub fn generate(&self, snapshot: &Snapshot) -> Result<XrayConfig, PanelError> {
        self.generate_at(snapshot, SystemTime::now())
    }

    /// 以给定时间判断用户是否活跃并生成文档
    pub fn generate_at(
        &self,
        snapshot: &Snapshot,
        now: SystemTime,
    ) -> Result<XrayConfig, PanelError> {
        let active: Vec<&User> = snapshot
            .users
            .iter()
            .filter(|u| {
                let ok = u.is_active(now);
                if !ok {
                    debug!(user = u.name.as_str(), "inactive user skipped");
                }
                ok
            })
            .collect();

        let mut inbounds = vec![api_inbound(self.api_port)];
        for inbound in snapshot.inbounds.iter().filter(|i| i.enabled) {
            inbounds.push(build_inbound(inbound, &active, self.sniffing)?);
        }

        let config = XrayConfig {
            log: LogSection {
                loglevel: self.log_level.clone(),
            },
            api: ApiSection {
                tag: API_TAG.to_string(),
                services: strings(&["HandlerService", "LoggerService", "StatsService"]),
            },
            dns: DnsSection {
                servers: strings(&[
                    "https+local://1.1.1.1/dns-query",
                    "https+local://8.8.8.8/dns-query",
                    "localhost",
                ]),
            },
            inbounds,
            outbounds: self.outbounds(snapshot),
            routing: compile_rules(&snapshot.rules),
            policy: policy(),
            stats: StatsSection::default(),
        };

        info!(
            users = active.len(),
            inbounds = config.inbounds.len(),
            outbounds = config.outbounds.len(),
            rules = config.routing.rules.len(),
            "xray config generated"
        );
        Ok(config)
    }

    /// direct、block 在前；用户出站按 priority 降序（稳定）追加
    fn outbounds(&self, snapshot: &Snapshot) -> Vec<OutboundConfig> {
        let mut result = vec![direct_outbound(), block_outbound()];

        let mut enabled: Vec<_> = snapshot.outbounds.iter().filter(|o| o.enabled).collect();
        enabled.sort_by_key(|o| Reverse(o.priority));

        for outbound in enabled {
            if [DIRECT_TAG, BLOCK_TAG, API_TAG].contains(&outbound.tag.as_str()) {
                warn!(tag = outbound.tag.as_str(), "outbound tag collides with a built-in, skipped");
                continue;
            }
            result.push(build_outbound(outbound));
        }
        result
    }
}
