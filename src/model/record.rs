use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::unix_secs;

/// 记录某个入站生成了哪个反代文件，供之后清理使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedConfigRecord {
    pub id: String,
    pub inbound_id: String,
    /// 生成文件对应的域名（可能是分配的子域名）
    pub domain: String,
    pub config_path: PathBuf,
    #[serde(default = "super::default_true")]
    pub is_managed: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

impl GeneratedConfigRecord {
    pub fn new(
        inbound_id: impl Into<String>,
        domain: impl Into<String>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        let now = unix_secs(SystemTime::now());
        Self {
            id: Uuid::new_v4().to_string(),
            inbound_id: inbound_id.into(),
            domain: domain.into(),
            config_path: config_path.into(),
            is_managed: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// upsert 的键：同一入站的同一文件只有一条记录
    pub fn same_key(&self, other: &GeneratedConfigRecord) -> bool {
        self.inbound_id == other.inbound_id && self.config_path == other.config_path
    }
}
