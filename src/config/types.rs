use serde::{Deserialize, Serialize};

use crate::common::PanelError;

/// Xray 可接受的日志级别
pub const XRAY_LOG_LEVELS: [&str; 5] = ["debug", "info", "warning", "error", "none"];

/// 面板配置文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub xray: XraySettings,
    #[serde(default)]
    pub nginx: NginxSettings,
    #[serde(default)]
    pub panel: PanelSettings,
}

impl PanelConfig {
    pub fn validate(&self) -> Result<(), PanelError> {
        if self.xray.api_port == 0 {
            return Err(PanelError::validation("xray.api_port must be non-zero"));
        }
        if !XRAY_LOG_LEVELS.contains(&self.xray.log_level.as_str()) {
            return Err(PanelError::validation(format!(
                "xray.log_level '{}' is not one of {:?}",
                self.xray.log_level, XRAY_LOG_LEVELS
            )));
        }
        if self.nginx.config_dir.trim().is_empty() {
            return Err(PanelError::validation("nginx.config_dir must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XraySettings {
    pub config_path: String,
    pub assets_path: String,
    pub api_port: u16,
    pub log_level: String,
    /// 入站开启流量嗅探
    pub sniffing: bool,
}

impl Default for XraySettings {
    fn default() -> Self {
        Self {
            config_path: "/usr/local/etc/xray/config.json".to_string(),
            assets_path: "/usr/local/share/xray".to_string(),
            api_port: 10085,
            log_level: "warning".to_string(),
            sniffing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxSettings {
    pub config_dir: String,
    /// acme.sh 证书目录，只读
    pub cert_dir: String,
    /// 生成记录的 JSON 文件
    pub records_path: String,
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            config_dir: "/etc/nginx/conf.d".to_string(),
            cert_dir: "/root/.acme.sh".to_string(),
            records_path: "/etc/xray-panel/nginx-records.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// 面板 HTTP 监听地址，如 `:8082`
    pub listen: String,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            listen: ":8082".to_string(),
        }
    }
}
