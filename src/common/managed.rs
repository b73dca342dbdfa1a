//! 受管文件：首行带有固定标记的生成文件
//!
//! 只有首行包含 [`MANAGED_HEADER`] 的文件才允许被覆盖或删除，
//! 手写的 nginx 配置永远不会被动到。

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::common::error::PanelError;

/// 写入每个生成文件首行的所有权标记
pub const MANAGED_HEADER: &str = "# Managed by Xray Panel";

/// 检查文件首行是否带有受管标记；文件不存在或不可读返回 false
pub fn is_managed_file(path: &Path) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut first_line = String::new();
    match BufReader::new(file).read_line(&mut first_line) {
        Ok(_) => first_line.contains(MANAGED_HEADER),
        Err(_) => false,
    }
}

/// 写入受管文件：目标已存在且不受管时拒绝写入
pub fn write_managed(path: &Path, content: &str) -> Result<(), PanelError> {
    if path.exists() && !is_managed_file(path) {
        return Err(PanelError::WriteConflict {
            path: path.to_path_buf(),
        });
    }

    let full = format!("{}\n{}", MANAGED_HEADER, content);
    write_atomic(path, full.as_bytes())
}

/// 删除受管文件，返回是否真的删除了
///
/// 删除前重新检查标记，期间被人手改过（标记被去掉）的文件会被保留。
pub fn remove_managed(path: &Path) -> Result<bool, PanelError> {
    if !is_managed_file(path) {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}

/// 原子写入：先写临时文件再重命名
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PanelError> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, data)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_overwrite_managed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.conf");

        write_managed(&path, "server {}\n").unwrap();
        assert!(is_managed_file(&path));
        let first = fs::read_to_string(&path).unwrap();
        assert!(first.starts_with(MANAGED_HEADER));

        write_managed(&path, "server { listen 80; }\n").unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(second, format!("{}\nserver {{ listen 80; }}\n", MANAGED_HEADER));
    }

    #[test]
    fn refuses_to_clobber_hand_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.conf");
        fs::write(&path, "# my own config\nserver {}\n").unwrap();

        let err = write_managed(&path, "generated").unwrap_err();
        assert!(matches!(err, PanelError::WriteConflict { .. }));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# my own config\nserver {}\n"
        );
    }

    #[test]
    fn marker_must_be_on_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.conf");
        fs::write(&path, format!("server {{}}\n{}\n", MANAGED_HEADER)).unwrap();
        assert!(!is_managed_file(&path));
    }

    #[test]
    fn remove_only_managed() {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("m.conf");
        let manual = dir.path().join("h.conf");
        write_managed(&managed, "x").unwrap();
        fs::write(&manual, "y").unwrap();

        assert!(remove_managed(&managed).unwrap());
        assert!(!managed.exists());
        assert!(!remove_managed(&manual).unwrap());
        assert!(manual.exists());
        assert!(!remove_managed(&dir.path().join("missing.conf")).unwrap());
    }

    #[test]
    fn atomic_write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        write_atomic(&path, b"{}").unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("c.json.tmp").exists());
    }
}
