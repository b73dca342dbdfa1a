//! Geo 资产文件内省
//!
//! 读取 Xray 资产目录下的 `geosite.dat` / `geoip.dat`，列出可用于路由规则的
//! geosite tag 与 geoip 国家代码。解码失败只影响单个文件。

pub mod wire;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::PanelError;

pub use wire::parse_geo_tags;

pub const GEOSITE_FILE: &str = "geosite.dat";
pub const GEOIP_FILE: &str = "geoip.dat";

/// 两个资产文件的可用性及内容
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoDataInfo {
    pub geosite_available: bool,
    pub geoip_available: bool,
    pub geosite_tags: Vec<String>,
    pub geoip_codes: Vec<String>,
}

/// 资产目录解析器
#[derive(Debug, Clone)]
pub struct GeoDataParser {
    assets_path: PathBuf,
}

impl GeoDataParser {
    pub fn new(assets_path: impl Into<PathBuf>) -> Self {
        Self {
            assets_path: assets_path.into(),
        }
    }

    pub fn assets_path(&self) -> &Path {
        &self.assets_path
    }

    /// geosite.dat 中的全部 tag
    pub fn geosite_tags(&self) -> Result<Vec<String>, PanelError> {
        self.parse_file(GEOSITE_FILE)
    }

    /// geoip.dat 中的全部国家代码
    pub fn geoip_codes(&self) -> Result<Vec<String>, PanelError> {
        self.parse_file(GEOIP_FILE)
    }

    /// 汇总信息；文件存在即视为可用，解码失败时列表为空
    pub fn info(&self) -> GeoDataInfo {
        let mut info = GeoDataInfo::default();

        if self.assets_path.join(GEOSITE_FILE).is_file() {
            info.geosite_available = true;
            info.geosite_tags = self.geosite_tags().unwrap_or_else(|e| {
                warn!(file = GEOSITE_FILE, error = %e, "geo asset unavailable");
                Vec::new()
            });
        }

        if self.assets_path.join(GEOIP_FILE).is_file() {
            info.geoip_available = true;
            info.geoip_codes = self.geoip_codes().unwrap_or_else(|e| {
                warn!(file = GEOIP_FILE, error = %e, "geo asset unavailable");
                Vec::new()
            });
        }

        info
    }

    fn parse_file(&self, name: &str) -> Result<Vec<String>, PanelError> {
        let path = self.assets_path.join(name);
        let data = std::fs::read(&path)?;
        let tags = parse_geo_tags(&data)?;
        debug!(path = %path.display(), count = tags.len(), "geo asset parsed");
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PanelErrorKind;
    use wire::tests::encode_geo_list;

    #[test]
    fn info_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let info = GeoDataParser::new(dir.path()).info();
        assert_eq!(info, GeoDataInfo::default());
    }

    #[test]
    fn info_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(GEOSITE_FILE),
            encode_geo_list(&["CN", "google", "category-ads"]),
        )
        .unwrap();
        std::fs::write(dir.path().join(GEOIP_FILE), encode_geo_list(&["US", "CN"])).unwrap();

        let info = GeoDataParser::new(dir.path()).info();
        assert!(info.geosite_available);
        assert!(info.geoip_available);
        assert_eq!(info.geosite_tags, vec!["category-ads", "cn", "google"]);
        assert_eq!(info.geoip_codes, vec!["cn", "us"]);
    }

    #[test]
    fn corrupt_file_is_available_but_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GEOIP_FILE), [0x0B]).unwrap();

        let parser = GeoDataParser::new(dir.path());
        let err = parser.geoip_codes().unwrap_err();
        assert_eq!(err.kind(), PanelErrorKind::Decode);

        let info = parser.info();
        assert!(info.geoip_available);
        assert!(info.geoip_codes.is_empty());
        assert!(!info.geosite_available);
    }
}
