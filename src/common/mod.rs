pub mod error;
pub mod managed;

pub use error::{DecodeError, PanelError, PanelErrorKind};
pub use managed::MANAGED_HEADER;

/// 拆分逗号分隔列表，去掉空白项
pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
