//! 积压表数据质量检查
//!
//! 只报告问题，不修改表格。结构错误（缺列）在加载时就已经拒绝，
//! 这里处理的是能加载但可能发布失败的数据。

use std::fmt;

use crate::models::ad::Column;
use crate::models::backlog::Backlog;

/// 发布时实际需要有值的列
pub const MANDATORY_VALUES: [Column; 6] = [
    Column::Titulo,
    Column::Descripcion,
    Column::Precio,
    Column::Categoria,
    Column::Provincia,
    Column::Telefono,
];

/// 单个问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// 某列有空单元格
    EmptyCells { column: Column, rows: Vec<usize> },
    /// 价格不是数字
    NonNumericPrice { rows: Vec<usize> },
    /// 图片来源不是 http(s) 链接
    InvalidPhotoUrl { rows: Vec<usize> },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyCells { column, rows } => write!(
                f,
                "列 '{}' 有 {} 个空单元格 (行: {})",
                column.header(),
                rows.len(),
                format_rows(rows)
            ),
            ValidationIssue::NonNumericPrice { rows } => write!(
                f,
                "{} 行价格不是数字，价格只能填数字，不要带货币符号 (行: {})",
                rows.len(),
                format_rows(rows)
            ),
            ValidationIssue::InvalidPhotoUrl { rows } => write!(
                f,
                "{} 行图片来源不是 http(s) 链接 (行: {})",
                rows.len(),
                format_rows(rows)
            ),
        }
    }
}

/// 检查报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub total_rows: usize,
    pub pending_rows: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "共 {} 行，待发布 {} 行",
            self.total_rows, self.pending_rows
        )?;
        if self.is_clean() {
            return write!(f, "✓ 未发现问题");
        }
        write!(f, "⚠️ 发现 {} 类问题:", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// 检查积压表
pub fn validate_backlog(backlog: &Backlog) -> ValidationReport {
    let mut issues = Vec::new();

    for column in MANDATORY_VALUES {
        let rows: Vec<usize> = (0..backlog.len())
            .filter(|&r| backlog.cell(r, column).map_or(true, |c| c.trim().is_empty()))
            .collect();
        if !rows.is_empty() {
            issues.push(ValidationIssue::EmptyCells { column, rows });
        }
    }

    let bad_prices: Vec<usize> = (0..backlog.len())
        .filter(|&r| {
            let price = backlog.cell(r, Column::Precio).unwrap_or("").trim();
            !price.is_empty() && !is_numeric_price(price)
        })
        .collect();
    if !bad_prices.is_empty() {
        issues.push(ValidationIssue::NonNumericPrice { rows: bad_prices });
    }

    let bad_photos: Vec<usize> = (0..backlog.len())
        .filter(|&r| {
            let url = backlog.cell(r, Column::Fotos).unwrap_or("").trim();
            !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://"))
        })
        .collect();
    if !bad_photos.is_empty() {
        issues.push(ValidationIssue::InvalidPhotoUrl { rows: bad_photos });
    }

    ValidationReport {
        total_rows: backlog.len(),
        pending_rows: backlog.pending_rows().len(),
        issues,
    }
}

fn is_numeric_price(price: &str) -> bool {
    price.replace(',', ".").parse::<f64>().is_ok()
}

/// 行号按表格习惯显示（表头是第 1 行）
fn format_rows(rows: &[usize]) -> String {
    let shown: Vec<String> = rows.iter().take(10).map(|r| (r + 2).to_string()).collect();
    if rows.len() > 10 {
        format!("{} ...", shown.join(", "))
    } else {
        shown.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backlog(rows: Vec<[&str; 4]>) -> Backlog {
        // 只关心 Titulo / Precio / Fotos / Telefono，其余列填满
        let headers: Vec<String> = Column::REQUIRED
            .iter()
            .map(|c| c.header().to_string())
            .collect();
        let rows = rows
            .into_iter()
            .map(|[titulo, precio, fotos, telefono]| {
                Column::REQUIRED
                    .iter()
                    .map(|c| match c {
                        Column::Titulo => titulo.to_string(),
                        Column::Precio => precio.to_string(),
                        Column::Fotos => fotos.to_string(),
                        Column::Telefono => telefono.to_string(),
                        Column::Publicado => "N".to_string(),
                        Column::Email | Column::Link | Column::Subcategoria => String::new(),
                        _ => "x".to_string(),
                    })
                    .collect()
            })
            .collect();
        Backlog::new(headers, rows).unwrap()
    }

    #[test]
    fn test_clean_backlog() {
        let report = validate_backlog(&backlog(vec![
            ["Mesa", "100", "https://img/1.jpg", "5355"],
            ["Silla", "25,5", "", "5356"],
        ]));
        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.pending_rows, 2);
    }

    #[test]
    fn test_reports_each_problem_kind() {
        let report = validate_backlog(&backlog(vec![
            ["", "100 USD", "ftp://x", "5355"],
            ["Silla", "20", "", " "],
        ]));
        assert_eq!(
            report.issues,
            vec![
                ValidationIssue::EmptyCells {
                    column: Column::Titulo,
                    rows: vec![0]
                },
                ValidationIssue::EmptyCells {
                    column: Column::Telefono,
                    rows: vec![1]
                },
                ValidationIssue::NonNumericPrice { rows: vec![0] },
                ValidationIssue::InvalidPhotoUrl { rows: vec![0] },
            ]
        );
    }

    #[test]
    fn test_issue_display_uses_sheet_row_numbers() {
        let issue = ValidationIssue::NonNumericPrice { rows: vec![0, 3] };
        assert!(issue.to_string().ends_with("(行: 2, 5)"));
    }

    #[test]
    fn test_report_display() {
        let clean = validate_backlog(&backlog(vec![["Mesa", "100", "", "5355"]]));
        assert!(clean.to_string().ends_with("✓ 未发现问题"));

        let dirty = validate_backlog(&backlog(vec![["", "100", "", "5355"]]));
        let text = dirty.to_string();
        assert!(text.contains("发现 1 类问题"));
        assert!(text.contains("列 'Titulo'"));
    }
}
