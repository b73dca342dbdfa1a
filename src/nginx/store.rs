//! 生成记录存储
//!
//! 记录每个入站生成了哪个反代文件，清理时无需重新扫描目录。
//! 提供内存实现（测试、一次性调用）和 JSON 文件实现。

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::common::managed::write_atomic;
use crate::common::PanelError;
use crate::model::user::unix_secs;
use crate::model::GeneratedConfigRecord;

/// 生成记录的存取接口；按 (inbound_id, config_path) 去重
pub trait RecordStore {
    /// 插入或更新记录；已存在时只更新域名与更新时间
    fn upsert(&mut self, record: GeneratedConfigRecord) -> Result<(), PanelError>;

    fn find_by_inbound(&self, inbound_id: &str) -> Result<Vec<GeneratedConfigRecord>, PanelError>;

    /// 删除入站的全部记录，返回删除条数
    fn delete_by_inbound(&mut self, inbound_id: &str) -> Result<usize, PanelError>;

    fn all(&self) -> Result<Vec<GeneratedConfigRecord>, PanelError>;
}

fn upsert_into(records: &mut Vec<GeneratedConfigRecord>, record: GeneratedConfigRecord) {
    match records.iter_mut().find(|r| r.same_key(&record)) {
        Some(existing) => {
            existing.domain = record.domain;
            existing.is_managed = record.is_managed;
            existing.updated_at = unix_secs(SystemTime::now()).max(existing.created_at);
        }
        None => records.push(record),
    }
}

fn delete_from(records: &mut Vec<GeneratedConfigRecord>, inbound_id: &str) -> usize {
    let before = records.len();
    records.retain(|r| r.inbound_id != inbound_id);
    before - records.len()
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Vec<GeneratedConfigRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn upsert(&mut self, record: GeneratedConfigRecord) -> Result<(), PanelError> {
        upsert_into(&mut self.records, record);
        Ok(())
    }

    fn find_by_inbound(&self, inbound_id: &str) -> Result<Vec<GeneratedConfigRecord>, PanelError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.inbound_id == inbound_id)
            .cloned()
            .collect())
    }

    fn delete_by_inbound(&mut self, inbound_id: &str) -> Result<usize, PanelError> {
        Ok(delete_from(&mut self.records, inbound_id))
    }

    fn all(&self) -> Result<Vec<GeneratedConfigRecord>, PanelError> {
        Ok(self.records.clone())
    }
}

/// JSON 文件存储，每次修改后原子写回
#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    records: Vec<GeneratedConfigRecord>,
}

impl JsonRecordStore {
    /// 打开存储；文件不存在时从空开始
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PanelError> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), count = records.len(), "record store opened");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), PanelError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

impl RecordStore for JsonRecordStore {
    fn upsert(&mut self, record: GeneratedConfigRecord) -> Result<(), PanelError> {
        upsert_into(&mut self.records, record);
        self.save()
    }

    fn find_by_inbound(&self, inbound_id: &str) -> Result<Vec<GeneratedConfigRecord>, PanelError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.inbound_id == inbound_id)
            .cloned()
            .collect())
    }

    fn delete_by_inbound(&mut self, inbound_id: &str) -> Result<usize, PanelError> {
        let removed = delete_from(&mut self.records, inbound_id);
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    fn all(&self) -> Result<Vec<GeneratedConfigRecord>, PanelError> {
        Ok(self.records.clone())
    }
}
