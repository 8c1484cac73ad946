//! # Revolico Publisher
//!
//! 从 CSV / Excel 广告表格批量发布 Revolico 分类广告，支持断点续跑
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露浏览器原语
//! - `PageDriver` - 导航、查询、填写、选择、上传、点击、等待、cookie
//! - `ChromePage` - 唯一的 page owner，基于 chromiumoxide 实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条广告
//! - `AssetFetcher` - 带重试与 10MB 上限的图片下载
//! - `FormDriver` - 发布表单状态机
//! - `CaptchaGate` - 验证码人工处理
//! - `CookieJar` - 登录 cookie 的保存与恢复
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条广告"的完整处理流程
//! - `RowCtx` - 上下文封装（批次 + 行号）
//! - `PublishFlow` - 流程编排（下载图片 → 填表提交 → 验证码重试）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 分批发布、断点保存、清理
//! - `orchestrator/pacing` - 发布节奏
//!
//! ## 模块结构

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser_and_page, launch_browser};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ChromePage, PageDriver};
pub use models::{AdRecord, Backlog, BacklogStore, CsvStore, XlsxStore};
pub use orchestrator::{Publisher, RunStats};
pub use workflow::{PublishFlow, RowCtx, RowOutcome};
