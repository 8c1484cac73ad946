//! 积压表的读写
//!
//! 按文件扩展名选择格式：`.csv` 走 `CsvStore`，`.xlsx` 走 `XlsxStore`。
//! 两种格式都先在内存里编码，再通过同一个原子替换写盘。

pub mod csv_store;
pub mod xlsx_store;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AppError, StoreError};
use crate::models::backlog::Backlog;

pub use csv_store::CsvStore;
pub use xlsx_store::XlsxStore;

/// 积压表的持久化接口
///
/// 编排层只通过它读写表格，测试可以替换实现。
pub trait BacklogStore: Send + Sync {
    /// 读取并校验整张表
    fn load(&self) -> Result<Backlog, AppError>;

    /// 写回整张表
    fn save(&self, backlog: &Backlog) -> Result<(), StoreError>;

    /// 存储位置（仅用于日志）
    fn location(&self) -> &Path;
}

/// 表格文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogFormat {
    Csv,
    Xlsx,
}

impl BacklogFormat {
    /// 由扩展名判断格式（不区分大小写）
    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(BacklogFormat::Csv),
            "xlsx" => Ok(BacklogFormat::Xlsx),
            _ => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// 按扩展名打开对应的存储
pub fn open_store(path: &Path) -> Result<Box<dyn BacklogStore>, StoreError> {
    Ok(match BacklogFormat::from_path(path)? {
        BacklogFormat::Csv => Box::new(CsvStore::new(path)),
        BacklogFormat::Xlsx => Box::new(XlsxStore::new(path)),
    })
}

/// 加载积压表
///
/// 缺少必需列时返回 `SchemaError`，列出全部缺失列。
pub fn load_backlog(path: &Path) -> Result<Backlog, AppError> {
    load_as(path, BacklogFormat::from_path(path)?)
}

/// 写回积压表
pub fn save_backlog(backlog: &Backlog, path: &Path) -> Result<(), StoreError> {
    save_as(backlog, path, BacklogFormat::from_path(path)?)
}

pub(crate) fn load_as(path: &Path, format: BacklogFormat) -> Result<Backlog, AppError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()).into());
    }

    let (headers, rows) = match format {
        BacklogFormat::Csv => csv_store::read_table(path)?,
        BacklogFormat::Xlsx => xlsx_store::read_table(path)?,
    };

    let backlog = Backlog::new(headers, rows)?;
    info!(
        "📄 已加载 {} 条广告 ({} 条待发布): {}",
        backlog.len(),
        backlog.pending_rows().len(),
        path.display()
    );
    Ok(backlog)
}

pub(crate) fn save_as(
    backlog: &Backlog,
    path: &Path,
    format: BacklogFormat,
) -> Result<(), StoreError> {
    let bytes = match format {
        BacklogFormat::Csv => csv_store::encode_table(backlog, path)?,
        BacklogFormat::Xlsx => xlsx_store::encode_table(backlog, path)?,
    };
    replace_file(path, &bytes)?;
    debug!("积压表已写入: {}", path.display());
    Ok(())
}

/// 原子替换文件内容
///
/// 先写同目录下的临时文件并刷盘，再重命名覆盖目标文件，
/// 写入中途失败时原文件保持不变。
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp_path = temp_path_for(path);
    let result = (|| {
        let mut file = File::create(&tmp_path).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp_path, path).map_err(io_err)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "backlog".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            BacklogFormat::from_path(Path::new("a/anuncios.CSV")).unwrap(),
            BacklogFormat::Csv
        );
        assert_eq!(
            BacklogFormat::from_path(Path::new("anuncios.xlsx")).unwrap(),
            BacklogFormat::Xlsx
        );
    }

    #[test]
    fn test_unknown_extension_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anuncios.ods");
        fs::write(&path, b"PK\x03\x04").unwrap();

        assert!(matches!(
            load_backlog(&path),
            Err(AppError::Store(StoreError::UnsupportedFormat(_)))
        ));
        assert!(matches!(
            open_store(Path::new("anuncios")),
            Err(StoreError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // 目标是一个目录，重命名必然失败
        let target = dir.path().join("ocupado.csv");
        fs::create_dir(&target).unwrap();

        assert!(replace_file(&target, b"x").is_err());
        assert!(!temp_path_for(&target).exists());
    }
}
