pub mod enhance;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result};

pub use types::{LogConfig, NginxSettings, PanelConfig, PanelSettings, XraySettings};

/// 读取 YAML 配置：先展开环境变量，再解析并校验
pub fn load_config(path: &str) -> Result<PanelConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path))?;
    let config = load_config_str(&raw)?;
    tracing::debug!(path, "config loaded");
    Ok(config)
}

/// 从字符串解析配置
pub fn load_config_str(content: &str) -> Result<PanelConfig> {
    let expanded = enhance::expand_env_vars(content);
    // 空文件视为全部默认值
    let config: PanelConfig = if expanded.trim().is_empty() {
        PanelConfig::default()
    } else {
        serde_yml::from_str(&expanded).context("invalid config YAML")?
    };
    config.validate()?;
    Ok(config)
}

/// 文件存在则加载，否则返回默认配置；第二个值表示是否读到了文件
pub fn load_or_default(path: &str) -> Result<(PanelConfig, bool)> {
    if Path::new(path).exists() {
        Ok((load_config(path)?, true))
    } else {
        Ok((PanelConfig::default(), false))
    }
}
