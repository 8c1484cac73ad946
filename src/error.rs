//! 错误类型
//!
//! 按关注点划分：表格结构、配置、存储、下载、发布。
//! `AppError` 汇总所有库内错误，二进制入口再用 `anyhow` 包装上下文。

use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 表格缺少必需列
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 表格读写错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 图片下载错误
    #[error("下载错误: {0}")]
    Download(#[from] DownloadError),
    /// 表单发布错误
    #[error("发布错误: {0}")]
    Publish(#[from] PublishError),
}

/// 表格缺少必需列
///
/// 总是列出全部缺失的列，而不是第一个。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("缺少必需列: {}", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 批次大小必须 > 0
    #[error("批次大小必须大于 0 (当前: {0})")]
    InvalidBatchSize(usize),
    /// 延迟区间无效
    #[error("延迟区间无效: 最小值 {min}s 大于最大值 {max}s")]
    InvalidDelayWindow { min: u64, max: u64 },
    /// 配置文件无法读取或解析
    #[error("无法加载配置文件 {path}: {reason}")]
    FileLoadFailed { path: String, reason: String },
}

/// 表格读写错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 文件不存在
    #[error("文件不存在: {}", .0.display())]
    NotFound(PathBuf),
    /// 文件 IO 失败
    #[error("文件操作失败 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// CSV 解析或写入失败
    #[error("CSV 处理失败 ({}): {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// Excel 工作簿读写失败
    #[error("Excel 处理失败 ({}): {reason}", .path.display())]
    Xlsx { path: PathBuf, reason: String },
    /// cookie 文件不是有效的 JSON
    #[error("cookie 文件格式错误 ({}): {source}", .path.display())]
    CookieFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// 不支持的表格格式（只支持 .csv 和 .xlsx）
    #[error("不支持的表格格式: {} (支持 .csv / .xlsx)", .0.display())]
    UnsupportedFormat(PathBuf),
    /// 行号超出范围
    #[error("行号 {row_id} 超出范围 (共 {len} 行)")]
    RowOutOfRange { row_id: usize, len: usize },
}

/// 图片下载错误
#[derive(Debug, Error)]
pub enum DownloadError {
    /// URL 为空或格式错误
    #[error("无效的下载 URL: '{0}'")]
    InvalidUrl(String),
    /// 文件超过大小上限（部分文件已删除）
    #[error("文件超过 {limit} 字节上限 (已读取 {size} 字节)")]
    TooLarge { size: u64, limit: u64 },
    /// 服务器返回非成功状态码
    #[error("服务器返回状态码 {status}: {url}")]
    BadStatus { url: String, status: u16 },
    /// 网络请求失败
    #[error("请求失败 ({url}): {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 写入本地文件失败
    #[error("写入文件失败 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// 是否为超过大小上限
    pub fn is_too_large(&self) -> bool {
        matches!(self, DownloadError::TooLarge { .. })
    }
}

/// 表单发布错误
///
/// CAPTCHA 不在这里：它是 `PublishOutcome::CaptchaPaused`，需要人工介入而不是失败。
#[derive(Debug, Error)]
pub enum PublishError {
    /// 找不到提交按钮
    #[error("找不到提交按钮")]
    SubmitControlMissing,
    /// 页面在超时时间内未就绪
    #[error("页面在 {0:?} 内未就绪")]
    Timeout(std::time::Duration),
    /// 浏览器操作失败
    #[error("浏览器操作失败 ({action}): {reason}")]
    Browser { action: String, reason: String },
    /// 没有操作员能处理验证码（输入已关闭）
    #[error("无法等待人工处理验证码: 输入已关闭")]
    OperatorUnavailable,
}

impl PublishError {
    /// 创建浏览器操作错误
    pub fn browser(action: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        PublishError::Browser {
            action: action.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for PublishError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        PublishError::browser("cdp", err)
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_every_column() {
        let err = SchemaError {
            missing: vec!["Precio".to_string(), "Email".to_string()],
        };
        assert_eq!(err.to_string(), "缺少必需列: Precio, Email");
    }

    #[test]
    fn test_schema_error_converts_transparently() {
        let err: AppError = SchemaError {
            missing: vec!["Link".to_string()],
        }
        .into();
        assert_eq!(err.to_string(), "缺少必需列: Link");
    }

    #[test]
    fn test_too_large_predicate() {
        assert!(DownloadError::TooLarge { size: 11, limit: 10 }.is_too_large());
        assert!(!DownloadError::InvalidUrl(String::new()).is_too_large());
    }
}
