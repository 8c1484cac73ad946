//! Excel 工作簿存储
//!
//! 只读写第一个工作表。第一行是表头，单元格一律按文本写回，
//! 这样电话号码等数字列不会丢失前导零或变成科学计数法。

use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use rust_xlsxwriter::Workbook;

use crate::error::{AppError, StoreError};
use crate::models::backlog::Backlog;
use crate::models::loaders::{load_as, save_as, BacklogFormat, BacklogStore};

/// 写回时使用的工作表名称
pub const SHEET_NAME: &str = "Anuncios";

/// `.xlsx` 文件存储
#[derive(Debug, Clone)]
pub struct XlsxStore {
    path: PathBuf,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BacklogStore for XlsxStore {
    fn load(&self) -> Result<Backlog, AppError> {
        load_as(&self.path, BacklogFormat::Xlsx)
    }

    fn save(&self, backlog: &Backlog) -> Result<(), StoreError> {
        save_as(backlog, &self.path, BacklogFormat::Xlsx)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

fn xlsx_err(path: &Path, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Xlsx {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// 读出第一个工作表的表头和数据行
pub(crate) fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), StoreError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: XlsxError| xlsx_err(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| xlsx_err(path, "工作簿中没有工作表"))?
        .map_err(|e| xlsx_err(path, e))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    Ok((headers, rows.collect()))
}

/// 把整张表编码为 `.xlsx`
pub(crate) fn encode_table(backlog: &Backlog, path: &Path) -> Result<Vec<u8>, StoreError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(|e| xlsx_err(path, e))?;

    let lines = std::iter::once(backlog.headers()).chain(backlog.rows().iter().map(Vec::as_slice));
    for (row_idx, cells) in lines.enumerate() {
        let row = u32::try_from(row_idx).map_err(|e| xlsx_err(path, e))?;
        for (col_idx, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let col = u16::try_from(col_idx).map_err(|e| xlsx_err(path, e))?;
            sheet
                .write_string(row, col, cell.as_str())
                .map_err(|e| xlsx_err(path, e))?;
        }
    }

    workbook.save_to_buffer().map_err(|e| xlsx_err(path, e))
}

/// 单元格转文本；整数值的浮点数去掉小数部分
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ad::Column;
    use crate::models::loaders::{load_backlog, save_backlog};

    fn backlog_with_extra_column() -> Backlog {
        let mut headers = vec!["Notas".to_string()];
        headers.extend(Column::REQUIRED.iter().map(|c| c.header().to_string()));
        headers[6] = "título".to_string();

        let mut row = vec!["primera".to_string()];
        row.extend(Column::REQUIRED.iter().map(|c| match c {
            Column::Titulo => "Mesa de madera".to_string(),
            Column::Telefono => "053123456".to_string(),
            Column::Precio => "100".to_string(),
            Column::Publicado => "N".to_string(),
            _ => String::new(),
        }));
        Backlog::new(headers, vec![row]).unwrap()
    }

    #[test]
    fn test_xlsx_checkpoint_preserves_headers_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anuncios.xlsx");

        let mut backlog = backlog_with_extra_column();
        save_backlog(&backlog, &path).unwrap();

        backlog.mark_done(0).unwrap();
        backlog.set_link(0, "https://www.revolico.com/item/1").unwrap();
        XlsxStore::new(&path).save(&backlog).unwrap();

        let reloaded = load_backlog(&path).unwrap();
        assert_eq!(reloaded.headers(), backlog.headers());
        assert_eq!(reloaded.headers()[6], "título");
        assert!(reloaded.is_published(0));
        assert_eq!(reloaded.cell(0, Column::Telefono), Some("053123456"));
        assert_eq!(
            reloaded.cell(0, Column::Link),
            Some("https://www.revolico.com/item/1")
        );
        assert_eq!(reloaded.rows()[0][0], "primera");
    }

    #[test]
    fn test_csv_bytes_are_not_a_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("falso.xlsx");
        std::fs::write(&path, "Categoria,Titulo\nx,y\n").unwrap();

        assert!(matches!(
            load_backlog(&path),
            Err(AppError::Store(StoreError::Xlsx { .. }))
        ));
    }

    #[test]
    fn test_numeric_cells_read_as_text() {
        assert_eq!(cell_text(&Data::Float(53123456.0)), "53123456");
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_text(&Data::Int(850)), "850");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
