//! 入站与域名的绑定
//!
//! 通配符证书下为每个入站分配一个随机子域名，并在域名不变时保持稳定。
//! 子域名同时用于隐藏入站，随机源必须是密码学安全的。

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use tracing::{debug, info};

use crate::common::PanelError;
use crate::model::{Domain, Inbound};

const LABEL_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const LABEL_MIN_LEN: usize = 6;
const LABEL_MAX_LEN: usize = 8;

/// 绑定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// 新分配了子域名
    Allocated(String),
    /// 非通配符域名，直接使用原主机名
    Literal(String),
    /// 域名未变，保留原值
    Unchanged(String),
    /// 解除绑定
    Cleared,
}

impl BindOutcome {
    pub fn actual_domain(&self) -> Option<&str> {
        match self {
            BindOutcome::Allocated(d) | BindOutcome::Literal(d) | BindOutcome::Unchanged(d) => {
                Some(d)
            }
            BindOutcome::Cleared => None,
        }
    }
}

/// 通配符子域名分配器
///
/// 泛型随机源只接受 `CryptoRng`；默认使用 `OsRng`，测试可以传入带种子的 ChaCha。
pub struct SubdomainAllocator<R = OsRng> {
    rng: R,
}

impl SubdomainAllocator<OsRng> {
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl Default for SubdomainAllocator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + CryptoRng> SubdomainAllocator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// 长度 6-8（均匀）、字符集 `[a-z0-9]` 的随机标签
    pub fn allocate_label(&mut self) -> String {
        let len = self.rng.gen_range(LABEL_MIN_LEN..=LABEL_MAX_LEN);
        (0..len)
            .map(|_| LABEL_CHARSET[self.rng.gen_range(0..LABEL_CHARSET.len())] as char)
            .collect()
    }

    /// 标签加上通配符的基础主机名
    pub fn allocate_for(&mut self, domain: &Domain) -> String {
        format!("{}.{}", self.allocate_label(), domain.base_hostname())
    }

    /// 把入站绑定到域名（`None` 表示解绑），更新 `domain_id` 与 `actual_domain`
    ///
    /// - 域名校验失败时不修改入站
    /// - 同一域名再次绑定时保留已有的有效子域名
    /// - 域名变更或首次被识别为通配符时重新分配
    pub fn bind(
        &mut self,
        inbound: &mut Inbound,
        domain: Option<&Domain>,
    ) -> Result<BindOutcome, PanelError> {
        let Some(domain) = domain else {
            inbound.domain_id = None;
            inbound.domain = None;
            inbound.actual_domain = None;
            debug!(inbound = inbound.tag.as_str(), "domain binding cleared");
            return Ok(BindOutcome::Cleared);
        };
        domain.validate()?;

        let same_domain = inbound.domain_id.as_deref() == Some(domain.id.as_str());
        let current = inbound.actual_domain.clone().filter(|d| !d.is_empty());

        let outcome = if domain.is_wildcard() {
            match current {
                Some(existing) if same_domain && is_allocated_under(&existing, domain) => {
                    BindOutcome::Unchanged(existing)
                }
                _ => BindOutcome::Allocated(self.allocate_for(domain)),
            }
        } else if same_domain && current.as_deref() == Some(domain.hostname.as_str()) {
            BindOutcome::Unchanged(domain.hostname.clone())
        } else {
            BindOutcome::Literal(domain.hostname.clone())
        };

        inbound.domain_id = Some(domain.id.clone());
        inbound.domain = Some(domain.clone());
        inbound.actual_domain = outcome.actual_domain().map(str::to_string);

        match &outcome {
            BindOutcome::Allocated(d) => {
                info!(inbound = inbound.tag.as_str(), actual_domain = d.as_str(), "subdomain allocated")
            }
            other => debug!(inbound = inbound.tag.as_str(), outcome = ?other, "domain bound"),
        }
        Ok(outcome)
    }
}

/// 已有值是否为该通配符下的单级子域名
fn is_allocated_under(actual: &str, domain: &Domain) -> bool {
    let base = domain.base_hostname();
    actual
        .strip_suffix(base)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .is_some_and(|label| !label.is_empty() && !label.contains('.'))
}
