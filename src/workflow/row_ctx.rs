//! 广告处理上下文
//!
//! 封装"我正在处理第几批的哪一行"这一信息

use std::fmt::Display;

/// 广告处理上下文
#[derive(Debug, Clone)]
pub struct RowCtx {
    /// 批次编号（从1开始）
    pub batch_number: usize,

    /// 表格行号（从0开始，不含表头）
    pub row_id: usize,

    /// 在本批中的位置（从1开始，仅用于日志显示）
    pub position: usize,

    /// 本批行数
    pub batch_len: usize,

    /// 广告标题
    pub title: String,
}

impl RowCtx {
    pub fn new(
        batch_number: usize,
        row_id: usize,
        position: usize,
        batch_len: usize,
        title: impl Into<String>,
    ) -> Self {
        Self {
            batch_number,
            row_id,
            position,
            batch_len,
            title: title.into(),
        }
    }

    /// 表格中的行号（表头占第 1 行）
    pub fn sheet_row(&self) -> usize {
        self.row_id + 2
    }
}

impl Display for RowCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次 {} | {}/{} | 行 {}]",
            self.batch_number,
            self.position,
            self.batch_len,
            self.sheet_row()
        )
    }
}
