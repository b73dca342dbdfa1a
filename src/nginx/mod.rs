//! nginx 反代配置生成
//!
//! 按有效域名分组，每个域名一个 `<domain>.conf`。只覆盖或删除首行带有
//! 受管标记的文件，手写配置遇到同名文件时报告写冲突并跳过该域名。

pub mod render;
pub mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::common::managed::{remove_managed, write_managed};
use crate::common::PanelError;
use crate::model::domain::is_valid_hostname;
use crate::model::{GeneratedConfigRecord, Inbound, Transport};

pub use render::{render_domain_file, render_panel_file};
pub use store::{JsonRecordStore, MemoryRecordStore, RecordStore};

/// 单个域名生成失败
#[derive(Debug)]
pub struct DomainFailure {
    pub domain: String,
    pub error: PanelError,
}

/// 一次同步的结果：域名之间相互独立，允许部分成功
#[derive(Debug, Default)]
pub struct SyncReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<DomainFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 清理结果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// 已删除的受管文件
    pub removed: Vec<PathBuf>,
    /// 不受管或已不存在而保留的文件
    pub skipped: Vec<PathBuf>,
    /// 删除的记录条数
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct NginxGenerator {
    config_dir: PathBuf,
}

impl NginxGenerator {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// 域名对应的文件路径
    pub fn config_path(&self, domain: &str) -> PathBuf {
        self.config_dir.join(format!("{}.conf", domain))
    }

    /// 为所有启用且绑定了域名的入站生成反代文件
    ///
    /// 每个成功写入的 (入站, 域名, 文件) 都会 upsert 一条记录。
    /// 记录写入失败只记日志，不影响文件结果。
    pub fn generate_http_configs(
        &self,
        inbounds: &[Inbound],
        store: &mut dyn RecordStore,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        for (server_name, group) in group_by_domain(inbounds) {
            let path = self.config_path(&server_name);
            match self.write_group(&server_name, &group, &path) {
                Ok(()) => {
                    for inbound in &group {
                        let record = GeneratedConfigRecord::new(&inbound.id, &server_name, &path);
                        if let Err(e) = store.upsert(record) {
                            warn!(inbound = inbound.id.as_str(), error = %e, "failed to record generated config");
                        }
                    }
                    info!(path = %path.display(), inbounds = group.len(), "nginx config written");
                    report.written.push(path);
                }
                Err(error) => {
                    warn!(domain = server_name.as_str(), error = %error, "nginx config not written");
                    report.failures.push(DomainFailure {
                        domain: server_name,
                        error,
                    });
                }
            }
        }

        report
    }

    fn write_group(
        &self,
        server_name: &str,
        group: &[&Inbound],
        path: &Path,
    ) -> Result<(), PanelError> {
        // 同组入站共享同一域名，证书取第一个
        let domain = group
            .first()
            .and_then(|i| i.domain.as_ref())
            .ok_or_else(|| PanelError::validation(format!("no domain bound for '{}'", server_name)))?;
        domain.validate()?;
        if server_name.starts_with("*.") || !is_valid_hostname(server_name) {
            return Err(PanelError::validation(format!(
                "'{}' is not a concrete hostname; allocate a subdomain first",
                server_name
            )));
        }
        for inbound in group {
            check_wildcard_allocated(inbound)?;
            check_location(inbound)?;
        }

        let content = render_domain_file(server_name, domain, group);
        write_managed(path, &content)
    }

    /// 删除入站生成过的受管文件及其记录
    ///
    /// 共享同一文件的其他入站需要调用方重新同步。
    /// 某个文件删除失败时仍会处理其余文件并删除记录，最后返回第一个错误。
    pub fn cleanup_inbound(
        &self,
        inbound_id: &str,
        store: &mut dyn RecordStore,
    ) -> Result<CleanupReport, PanelError> {
        cleanup_with(inbound_id, store, remove_managed)
    }

    /// 生成面板自身的反代文件
    pub fn generate_panel_config(
        &self,
        domain: &str,
        cert_path: &str,
        key_path: &str,
        listen: &str,
    ) -> Result<PathBuf, PanelError> {
        if domain.starts_with("*.") || !is_valid_hostname(domain) {
            return Err(PanelError::validation(format!(
                "malformed panel hostname '{}'",
                domain
            )));
        }
        if cert_path.trim().is_empty() || key_path.trim().is_empty() {
            return Err(PanelError::validation("panel certificate paths are required"));
        }

        let path = self.config_path(domain);
        write_managed(&path, &render_panel_file(domain, cert_path, key_path, listen))?;
        info!(path = %path.display(), "panel nginx config written");
        Ok(path)
    }
}

fn cleanup_with(
    inbound_id: &str,
    store: &mut dyn RecordStore,
    mut remove: impl FnMut(&Path) -> Result<bool, PanelError>,
) -> Result<CleanupReport, PanelError> {
    let mut report = CleanupReport::default();
    let mut first_error = None;

    for record in store.find_by_inbound(inbound_id)? {
        if report.removed.contains(&record.config_path) {
            continue;
        }
        if !record.is_managed {
            debug!(path = %record.config_path.display(), "config not managed, kept");
            report.skipped.push(record.config_path);
            continue;
        }
        match remove(&record.config_path) {
            Ok(true) => {
                info!(path = %record.config_path.display(), "nginx config removed");
                report.removed.push(record.config_path);
            }
            Ok(false) => {
                debug!(path = %record.config_path.display(), "config not managed or missing, kept");
                report.skipped.push(record.config_path);
            }
            Err(e) => {
                warn!(path = %record.config_path.display(), error = %e, "failed to remove nginx config");
                first_error.get_or_insert(e);
            }
        }
    }

    report.records = store.delete_by_inbound(inbound_id)?;
    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

/// 通配符域名下的入站必须已分配子域名，证书不覆盖裸域名
fn check_wildcard_allocated(inbound: &Inbound) -> Result<(), PanelError> {
    let Some(domain) = inbound.domain.as_ref() else {
        return Ok(());
    };
    if !domain.is_wildcard() {
        return Ok(());
    }
    match inbound.actual_domain.as_deref() {
        Some(actual) if !actual.is_empty() && actual != domain.base_hostname() => Ok(()),
        _ => Err(PanelError::validation(format!(
            "inbound '{}' is bound to wildcard '{}' without an allocated subdomain",
            inbound.tag, domain.hostname
        ))),
    }
}

fn has_forbidden_char(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}'))
}

/// location 的取值会原样写进 nginx 文件，空值或特殊字符会让整份文件无法加载
fn check_location(inbound: &Inbound) -> Result<(), PanelError> {
    match inbound.transport {
        Transport::Grpc => {
            let name = inbound.service_name.as_str();
            if name.is_empty() || name.contains('/') || has_forbidden_char(name) {
                return Err(PanelError::validation(format!(
                    "inbound '{}' has invalid gRPC service name '{}'",
                    inbound.tag, name
                )));
            }
        }
        Transport::Ws | Transport::Xhttp => {
            let path = inbound.path.as_str();
            if !path.starts_with('/') || has_forbidden_char(path) {
                return Err(PanelError::validation(format!(
                    "inbound '{}' has invalid {} path '{}'",
                    inbound.tag, inbound.transport, path
                )));
            }
        }
        // 渲染时跳过并告警
        Transport::Other(_) => {}
    }
    Ok(())
}

/// 按有效域名分组；BTreeMap 保证输出顺序确定，组内保持输入顺序
fn group_by_domain(inbounds: &[Inbound]) -> BTreeMap<String, Vec<&Inbound>> {
    let mut groups: BTreeMap<String, Vec<&Inbound>> = BTreeMap::new();
    for inbound in inbounds.iter().filter(|i| i.enabled) {
        let Some(domain) = inbound.domain.as_ref() else {
            continue;
        };
        if domain.is_reality() {
            debug!(inbound = inbound.tag.as_str(), "reality domain is not reverse proxied");
            continue;
        }
        if let Some(name) = inbound.effective_domain() {
            groups.entry(name.to_string()).or_default().push(inbound);
        }
    }
    groups
}
