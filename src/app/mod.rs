//! 面板的应用层编排
//!
//! 把配置中的路径与参数交给各个生成器。所有输入通过参数显式传入，
//! 不持有任何全局状态。

pub mod binding;

use std::path::PathBuf;

use tracing::info;

use crate::common::PanelError;
use crate::config::PanelConfig;
use crate::geodata::{GeoDataInfo, GeoDataParser};
use crate::model::{Domain, Inbound, Snapshot};
use crate::nginx::{CleanupReport, NginxGenerator, RecordStore, SyncReport};
use crate::xray::{Generator, XrayConfig};

pub use binding::{BindOutcome, SubdomainAllocator};

pub struct Panel {
    config: PanelConfig,
    xray: Generator,
    nginx: NginxGenerator,
    geodata: GeoDataParser,
}

impl Panel {
    pub fn new(config: PanelConfig) -> Self {
        let xray = Generator::new(&config.xray);
        let nginx = NginxGenerator::new(&config.nginx.config_dir);
        let geodata = GeoDataParser::new(&config.xray.assets_path);
        Self {
            config,
            xray,
            nginx,
            geodata,
        }
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn nginx(&self) -> &NginxGenerator {
        &self.nginx
    }

    /// 生成 Xray 配置文档
    pub fn generate_xray(&self, snapshot: &Snapshot) -> Result<XrayConfig, PanelError> {
        self.xray.generate(snapshot)
    }

    /// 生成并写入 Xray 配置；`output` 为空时写到配置的 `xray.config_path`
    pub fn write_xray_config(
        &self,
        snapshot: &Snapshot,
        output: Option<PathBuf>,
    ) -> Result<PathBuf, PanelError> {
        let document = self.generate_xray(snapshot)?;
        let path = output.unwrap_or_else(|| PathBuf::from(&self.config.xray.config_path));
        document.write_to(&path)?;
        Ok(path)
    }

    /// 同步全部反代文件
    pub fn sync_nginx(&self, snapshot: &Snapshot, store: &mut dyn RecordStore) -> SyncReport {
        let report = self.nginx.generate_http_configs(&snapshot.inbounds, store);
        info!(
            written = report.written.len(),
            failed = report.failures.len(),
            "nginx sync finished"
        );
        report
    }

    pub fn cleanup_inbound(
        &self,
        inbound_id: &str,
        store: &mut dyn RecordStore,
    ) -> Result<CleanupReport, PanelError> {
        self.nginx.cleanup_inbound(inbound_id, store)
    }

    /// 面板自身的反代文件，监听端口取自 `panel.listen`
    pub fn generate_panel_nginx(
        &self,
        domain: &str,
        cert_path: &str,
        key_path: &str,
    ) -> Result<PathBuf, PanelError> {
        self.nginx
            .generate_panel_config(domain, cert_path, key_path, &self.config.panel.listen)
    }

    pub fn geodata_info(&self) -> GeoDataInfo {
        self.geodata.info()
    }

    /// 使用系统随机源绑定入站与域名
    pub fn bind_domain(
        &self,
        inbound: &mut Inbound,
        domain: Option<&Domain>,
    ) -> Result<BindOutcome, PanelError> {
        SubdomainAllocator::new().bind(inbound, domain)
    }
}
