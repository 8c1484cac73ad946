//! 日志工具模块
//!
//! 三个输出：
//! - 控制台：`RUST_LOG` 控制，默认 info
//! - `errores.*.log`：按天滚动，只收 warn 及以上
//! - `published_YYYYMMDD.log`：只收 target 为 `published` 的成功发布记录

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// 成功发布记录使用的 tracing target
pub const PUBLISHED_TARGET: &str = "published";

/// 日志文件的写入守卫，运行期间必须保持存活
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
    pub published_log: PathBuf,
}

/// 当天的发布记录文件路径
pub fn published_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!(
        "published_{}.log",
        chrono::Local::now().format("%Y%m%d")
    ))
}

/// 初始化日志
pub fn init(log_dir: &Path) -> Result<LogGuards> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("无法创建日志目录: {}", log_dir.display()))?;

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer()
        .with_target(false)
        .with_filter(console_filter);

    let error_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("errores")
        .filename_suffix("log")
        .build(log_dir)
        .context("无法创建错误日志")?;
    let (error_writer, error_guard) = tracing_appender::non_blocking(error_appender);
    let error_layer = fmt::layer()
        .with_writer(error_writer)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let published_log = published_log_path(log_dir);
    let published_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&published_log)
        .with_context(|| format!("无法打开发布记录: {}", published_log.display()))?;
    let (published_writer, published_guard) = tracing_appender::non_blocking(published_file);
    let published_layer = fmt::layer()
        .with_writer(published_writer)
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .with_filter(filter_fn(|meta| meta.target() == PUBLISHED_TARGET));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(error_layer)
        .with(published_layer)
        .try_init()
        .context("日志系统已初始化")?;

    Ok(LogGuards {
        _guards: vec![error_guard, published_guard],
        published_log,
    })
}

/// 记录程序启动信息
pub fn log_startup(
    input: &Path,
    published_log: &Path,
    batch_size: usize,
    delay_min: u64,
    delay_max: u64,
) {
    info!("{}", "=".repeat(60));
    info!("🚀 Revolico 批量发布启动");
    info!("📄 广告表格: {}", input.display());
    info!("📒 发布记录: {}", published_log.display());
    info!("📦 批次大小: {}", batch_size);
    info!("⏱️ 间隔: {}-{} 秒", delay_min, delay_max);
    info!("{}", "=".repeat(60));
}

/// 记录积压加载信息
pub fn log_backlog_loaded(total: usize, pending: usize, batches: usize) {
    info!("✓ 共 {} 条广告，待发布 {} 条", total, pending);
    info!("📋 分为 {} 批处理，每批结束后保存进度\n", batches);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
