use std::path::{Path, PathBuf};

use crate::error::{AppError, StoreError};
use crate::models::backlog::Backlog;
use crate::models::loaders::{load_as, save_as, BacklogFormat, BacklogStore};

/// CSV 文件存储
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BacklogStore for CsvStore {
    fn load(&self) -> Result<Backlog, AppError> {
        load_as(&self.path, BacklogFormat::Csv)
    }

    fn save(&self, backlog: &Backlog) -> Result<(), StoreError> {
        save_as(backlog, &self.path, BacklogFormat::Csv)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// 读出表头和数据行（允许行长不一致）
pub(crate) fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

/// 把整张表编码为 CSV
pub(crate) fn encode_table(backlog: &Backlog, path: &Path) -> Result<Vec<u8>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(backlog.headers()).map_err(csv_err)?;
    for row in backlog.rows() {
        writer.write_record(row).map_err(csv_err)?;
    }

    writer.into_inner().map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e.into_error(),
    })
}
