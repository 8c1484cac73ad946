//! 页面操作能力 - 基础设施层
//!
//! 表单驱动只依赖这些原语，不关心背后是哪种浏览器实现。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

/// 页面上找到的元素
///
/// 通过选择器重新定位，`tag` 决定填写方式（input / textarea / select）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub selector: String,
    pub tag: String,
    pub input_type: Option<String>,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            tag: tag.into().to_lowercase(),
            input_type: None,
        }
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into().to_lowercase());
        self
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn is_file_input(&self) -> bool {
        self.tag == "input" && self.input_type.as_deref() == Some("file")
    }
}

/// 浏览器 cookie，用于跨运行保留登录状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "root_path")]
    pub path: String,
    /// 过期时间（Unix 秒），会话 cookie 为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn root_path() -> String {
    "/".to_string()
}

/// 浏览器页面原语
///
/// 整个运行期间只有一个实例，由表单驱动独占。
#[async_trait]
pub trait PageDriver: Send {
    /// 打开 URL 并等待加载
    async fn navigate(&mut self, url: &str) -> Result<(), PublishError>;

    /// 查找元素，不存在时返回 `None`
    async fn query(&mut self, selector: &str) -> Result<Option<ElementHandle>, PublishError>;

    /// 填写文本框
    async fn fill(&mut self, element: &ElementHandle, value: &str) -> Result<(), PublishError>;

    /// 按显示文本选择下拉项
    async fn select_option(
        &mut self,
        element: &ElementHandle,
        label: &str,
    ) -> Result<(), PublishError>;

    /// 给文件输入框设置本地文件
    async fn set_file(&mut self, element: &ElementHandle, path: &Path)
        -> Result<(), PublishError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), PublishError>;

    /// 等待页面稳定，超时返回 `PublishError::Timeout`
    async fn wait_for_idle(&mut self, timeout: Duration) -> Result<(), PublishError>;

    /// 当前页面 URL
    async fn current_url(&mut self) -> Result<String, PublishError>;

    /// 页面可见文本
    async fn body_text(&mut self) -> Result<String, PublishError>;

    /// 当前页面可见的 cookie
    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, PublishError>;

    /// 写入 cookie，不要求当前已打开对应域名
    async fn set_cookies(&mut self, cookies: &[SessionCookie]) -> Result<(), PublishError>;

    /// 释放会话，可重复调用
    async fn close(&mut self) -> Result<(), PublishError>;
}
