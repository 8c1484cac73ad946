//! 广告积压表（内存中的表格）
//!
//! 保存原始表头文字、顺序和所有单元格，包括未知列，
//! 这样写回磁盘时表头与读入时完全一致。归一化后的列名只用于索引。

use std::collections::HashMap;

use crate::error::{SchemaError, StoreError};
use crate::models::ad::{AdRecord, Column, PublishStatus};

/// 广告积压表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backlog {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    index: HashMap<Column, usize>,
}

impl Backlog {
    /// 由表头和数据行构建，校验必需列
    ///
    /// 表头按归一化后的列名建索引，但原文保留；短行用空字符串补齐到表头宽度。
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, SchemaError> {
        let mut index = HashMap::new();
        for (pos, header) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(header) {
                // 重复列以第一次出现为准
                index.entry(column).or_insert(pos);
            }
        }

        let missing: Vec<String> = Column::REQUIRED
            .iter()
            .filter(|c| !index.contains_key(c))
            .map(|c| c.header().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError { missing });
        }

        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        Ok(Self {
            headers,
            rows,
            index,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 读取一行为广告记录
    pub fn record(&self, row_id: usize) -> Option<AdRecord> {
        let row = self.rows.get(row_id)?;
        let cell = |column: Column| row[self.index[&column]].clone();
        Some(AdRecord {
            row_id,
            categoria: cell(Column::Categoria),
            subcategoria: cell(Column::Subcategoria),
            fotos: cell(Column::Fotos),
            precio: cell(Column::Precio),
            moneda: cell(Column::Moneda),
            titulo: cell(Column::Titulo),
            descripcion: cell(Column::Descripcion),
            provincia: cell(Column::Provincia),
            municipio: cell(Column::Municipio),
            telefono: cell(Column::Telefono),
            email: cell(Column::Email),
            status: PublishStatus::from_cell(&cell(Column::Publicado)),
            link: cell(Column::Link),
        })
    }

    /// 某列的单元格
    pub fn cell(&self, row_id: usize, column: Column) -> Option<&str> {
        self.rows
            .get(row_id)
            .map(|row| row[self.index[&column]].as_str())
    }

    pub fn is_published(&self, row_id: usize) -> bool {
        self.cell(row_id, Column::Publicado)
            .map(|c| PublishStatus::from_cell(c) == PublishStatus::Published)
            .unwrap_or(false)
    }

    /// 所有待发布行的行号，保持表格顺序
    pub fn pending_rows(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&row_id| !self.is_published(row_id))
            .collect()
    }

    /// 标记为已发布（只改内存，持久化由后续 save 完成）
    pub fn mark_done(&mut self, row_id: usize) -> Result<(), StoreError> {
        self.set_cell(row_id, Column::Publicado, PublishStatus::Published.as_cell())
    }

    /// 记录发布后的链接（只改内存）
    pub fn set_link(&mut self, row_id: usize, link: &str) -> Result<(), StoreError> {
        self.set_cell(row_id, Column::Link, link)
    }

    fn set_cell(&mut self, row_id: usize, column: Column, value: &str) -> Result<(), StoreError> {
        let len = self.rows.len();
        let pos = self.index[&column];
        let row = self
            .rows
            .get_mut(row_id)
            .ok_or(StoreError::RowOutOfRange { row_id, len })?;
        row[pos] = value.to_string();
        Ok(())
    }
}
