//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量发布器
//! - 分批、逐行委托发布流程
//! - 每批结束保存进度
//! - 持有浏览器会话，负责最终清理
//! - 输出全局统计信息
//!
//! ### `pacing` - 节奏控制
//! - 行间随机等待、批内冷却、每小时上限
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Batch>)
//!     ↓
//! workflow::PublishFlow (处理单条广告)
//!     ↓
//! services (能力层：下载 / 表单 / 验证码)
//!     ↓
//! infrastructure (基础设施：PageDriver)
//! ```

pub mod batch_processor;
pub mod pacing;

pub use batch_processor::{Publisher, RunStats};
pub use pacing::{Pacer, PacingPolicy};
