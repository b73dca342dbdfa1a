//! 面板的数据模型
//!
//! 实体由外部持久层创建和修改，这里只读取一次性的快照。
//! 每个实体都有显式的构造函数负责分配 id 和默认值。

pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod record;
pub mod routing;
pub mod user;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::managed::write_atomic;
use crate::common::PanelError;

pub use domain::{Domain, DomainType};
pub use inbound::{Inbound, Protocol, Transport};
pub use outbound::{Outbound, OutboundSettings, OutboundType};
pub use record::GeneratedConfigRecord;
pub use routing::{RoutingRule, RuleType};
pub use user::User;

pub(crate) fn default_true() -> bool {
    true
}

/// 一次生成所需的完整输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    pub rules: Vec<RoutingRule>,
    pub domains: Vec<Domain>,
}

impl Snapshot {
    /// 从 JSON 文件加载并解析入站的域名引用
    pub fn load(path: &Path) -> Result<Self, PanelError> {
        let content = std::fs::read_to_string(path)?;
        let mut snapshot: Snapshot = serde_json::from_str(&content)?;
        snapshot.resolve_domains();
        debug!(
            path = %path.display(),
            users = snapshot.users.len(),
            inbounds = snapshot.inbounds.len(),
            outbounds = snapshot.outbounds.len(),
            rules = snapshot.rules.len(),
            domains = snapshot.domains.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), PanelError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    /// 按 `domain_id` 为每个入站挂上对应的 [`Domain`]
    pub fn resolve_domains(&mut self) {
        let by_id: HashMap<&str, &Domain> =
            self.domains.iter().map(|d| (d.id.as_str(), d)).collect();
        for inbound in &mut self.inbounds {
            inbound.domain = match inbound.domain_id.as_deref() {
                Some(id) if !id.is_empty() => {
                    let found = by_id.get(id).map(|d| (*d).clone());
                    if found.is_none() {
                        warn!(inbound = inbound.tag.as_str(), domain_id = id, "inbound references unknown domain");
                    }
                    found
                }
                _ => None,
            };
        }
    }

    pub fn find_domain(&self, id: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id == id)
    }

    pub fn find_inbound_mut(&mut self, id: &str) -> Option<&mut Inbound> {
        self.inbounds.iter_mut().find(|i| i.id == id)
    }
}
