use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SECS_PER_DAY: u64 = 86_400;

/// 代理用户，带流量与有效期限制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// 协议凭据（VLESS id，同时复用为 Trojan 密码）
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// 字节数，0 = 不限
    #[serde(default)]
    pub traffic_limit: u64,
    #[serde(default)]
    pub traffic_used: u64,
    /// 过期时间（Unix 秒），None = 永不过期
    #[serde(default)]
    pub expiry_date: Option<u64>,
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub sub_path: String,
    #[serde(default)]
    pub note: String,
}

impl User {
    /// 创建用户并分配 id、凭据 UUID 和订阅路径
    pub fn new(name: impl Into<String>) -> Self {
        let sub_path = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            uuid: Uuid::new_v4().to_string(),
            name: name.into(),
            email: String::new(),
            traffic_limit: 0,
            traffic_used: 0,
            expiry_date: None,
            enabled: true,
            sub_path,
            note: String::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_traffic_limit(mut self, limit: u64) -> Self {
        self.traffic_limit = limit;
        self
    }

    pub fn with_expiry(mut self, expiry: SystemTime) -> Self {
        self.expiry_date = Some(unix_secs(expiry));
        self
    }

    /// 启用、未过期且未超出流量限制
    pub fn is_active(&self, now: SystemTime) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(expiry) = self.expiry_date {
            if unix_secs(now) > expiry {
                return false;
            }
        }
        if self.traffic_limit > 0 && self.traffic_used >= self.traffic_limit {
            return false;
        }
        true
    }

    /// 剩余流量，None = 不限
    pub fn remaining_traffic(&self) -> Option<u64> {
        if self.traffic_limit == 0 {
            return None;
        }
        Some(self.traffic_limit.saturating_sub(self.traffic_used))
    }

    /// 剩余天数，None = 永不过期
    pub fn remaining_days(&self, now: SystemTime) -> Option<u64> {
        let expiry = self.expiry_date?;
        Some(expiry.saturating_sub(unix_secs(now)) / SECS_PER_DAY)
    }
}

pub(crate) fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
