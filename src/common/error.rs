use std::path::PathBuf;

use thiserror::Error;

/// geo 资产文件解码错误，携带出错时的字节偏移
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated buffer at offset {offset}: need {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("varint longer than 64 bits at offset {offset}")]
    VarintOverflow { offset: usize },

    #[error("unknown wire type {wire_type} at offset {offset}")]
    UnknownWireType { wire_type: u8, offset: usize },
}

impl DecodeError {
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::VarintOverflow { offset }
            | DecodeError::UnknownWireType { offset, .. } => *offset,
        }
    }
}

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("cannot assemble inbound '{tag}': {reason}")]
    Assembly { tag: String, reason: String },

    #[error("file {} exists and is not managed by the panel", path.display())]
    WriteConflict { path: PathBuf },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PanelError {
    pub fn assembly(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        PanelError::Assembly {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        PanelError::Validation(msg.into())
    }

    /// 调用方能否降级处理，而不是放弃整次生成
    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    pub fn kind(&self) -> PanelErrorKind {
        match self {
            PanelError::Decode(_) => PanelErrorKind::Decode,
            PanelError::Assembly { .. } => PanelErrorKind::Assembly,
            PanelError::WriteConflict { .. } => PanelErrorKind::WriteConflict,
            PanelError::Validation(_) => PanelErrorKind::Validation,
            PanelError::Io(_) => PanelErrorKind::Io,
            PanelError::Json(_) | PanelError::Yaml(_) => PanelErrorKind::Serialization,
            PanelError::Other(_) => PanelErrorKind::Other,
        }
    }
}

/// 错误类别，匹配时不需要借用错误本身
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelErrorKind {
    Decode,
    Assembly,
    WriteConflict,
    Validation,
    Io,
    Serialization,
    Other,
}

impl PanelErrorKind {
    /// 解码错误退化为空列表；写冲突只影响单个域名
    pub fn is_recoverable(self) -> bool {
        matches!(self, PanelErrorKind::Decode | PanelErrorKind::WriteConflict)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PanelErrorKind::Decode => "DECODE",
            PanelErrorKind::Assembly => "ASSEMBLY",
            PanelErrorKind::WriteConflict => "WRITE_CONFLICT",
            PanelErrorKind::Validation => "VALIDATION",
            PanelErrorKind::Io => "IO",
            PanelErrorKind::Serialization => "SERIALIZATION",
            PanelErrorKind::Other => "OTHER",
        }
    }
}
