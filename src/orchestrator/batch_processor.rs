//! 批量发布器 - 编排层
//!
//! ## 职责
//!
//! 1. **分批**：从积压表中取出待发布行，按批次大小切分
//! 2. **逐行发布**：委托 `PublishFlow` 处理单条广告
//! 3. **节奏控制**：每行之后等待，每 20 行冷却，可选每小时上限
//! 4. **断点保存**：每批结束后把整张表写回磁盘，中断后可续跑
//! 5. **资源管理**：唯一持有 `FormDriver`，任何退出路径都会关闭会话并清空图片缓存
//!
//! 一次只发布一条广告，Ctrl-C 只负责取消令牌。

use std::time::Duration;

use colored::Colorize;
use indicatif::ProgressBar;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::models::{partition, Backlog, BacklogStore, Batch};
use crate::orchestrator::pacing::Pacer;
use crate::services::FormDriver;
use crate::utils::logging::{log_backlog_loaded, truncate_text, PUBLISHED_TARGET};
use crate::utils::progress::{create_batch_progress, format_duration};
use crate::workflow::{PublishFlow, RowCtx, RowOutcome};

/// 运行统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// 表格总行数
    pub total_rows: usize,
    /// 开始时待发布行数
    pub pending: usize,
    pub batches: usize,
    pub published: usize,
    pub failed: usize,
    pub captcha_pauses: usize,
    /// 图片下载失败、不带图片发布的行数
    pub images_dropped: usize,
    /// 已发布而跳过的行数
    pub skipped: usize,
    /// 保存次数
    pub saves: usize,
    pub cancelled: bool,
    /// 本次运行耗时
    pub elapsed: Duration,
}

/// 批次内的控制流
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchControl {
    Continue,
    Cancelled,
}

/// 批量发布器
pub struct Publisher {
    store: Box<dyn BacklogStore>,
    driver: FormDriver,
    flow: PublishFlow,
    pacer: Pacer,
    batch_size: usize,
    cancel: CancellationToken,
    show_progress: bool,
}

impl Publisher {
    pub fn new(
        store: Box<dyn BacklogStore>,
        driver: FormDriver,
        flow: PublishFlow,
        pacer: Pacer,
        batch_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            driver,
            flow,
            pacer,
            batch_size,
            cancel,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// 发布所有待发布广告
    ///
    /// 无论成功、出错还是被取消，返回前都会关闭浏览器会话并清空图片缓存。
    pub async fn run(mut self, mut backlog: Backlog) -> Result<RunStats, AppError> {
        let started = Instant::now();
        let mut result = self.process_backlog(&mut backlog).await;
        self.cleanup().await;

        match &mut result {
            Ok(stats) => {
                stats.elapsed = started.elapsed();
                print_final_stats(stats);
            }
            Err(e) => error!("❌ 运行中止 (已运行 {}): {}", format_duration(started.elapsed()), e),
        }
        result
    }

    async fn process_backlog(&mut self, backlog: &mut Backlog) -> Result<RunStats, AppError> {
        let pending = backlog.pending_rows();
        let mut stats = RunStats {
            total_rows: backlog.len(),
            pending: pending.len(),
            skipped: backlog.len() - pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            warn!("⚠️ 没有待发布的广告，程序结束");
            return Ok(stats);
        }

        let batches = partition(&pending, self.batch_size)?;
        stats.batches = batches.len();
        log_backlog_loaded(stats.total_rows, stats.pending, batches.len());

        for batch in &batches {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            log_batch_start(batch, batches.len());
            self.pacer.start_batch();

            let pb = create_batch_progress(batch.len() as u64, batch.number, self.show_progress);
            let control = self.process_batch(backlog, batch, &mut stats, &pb).await;
            pb.finish_and_clear();

            // 即使本批出错或被取消，已完成的行也要落盘
            self.checkpoint(backlog, batch)?;
            stats.saves += 1;

            if control? == BatchControl::Cancelled {
                warn!("⏹️ 已取消，进度已保存，下次运行从未发布的行继续");
                stats.cancelled = true;
                break;
            }
        }

        Ok(stats)
    }

    async fn process_batch(
        &mut self,
        backlog: &mut Backlog,
        batch: &Batch,
        stats: &mut RunStats,
        pb: &ProgressBar,
    ) -> Result<BatchControl, AppError> {
        for (idx, &row_id) in batch.rows.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(BatchControl::Cancelled);
            }

            if backlog.is_published(row_id) {
                stats.skipped += 1;
                pb.inc(1);
                continue;
            }
            let Some(record) = backlog.record(row_id) else {
                debug!("行 {} 不存在，跳过", row_id);
                continue;
            };

            if !self.pacer.wait_for_hourly_slot(&self.cancel).await {
                return Ok(BatchControl::Cancelled);
            }

            let ctx = RowCtx::new(batch.number, row_id, idx + 1, batch.len(), &record.titulo);
            let report = self
                .flow
                .run(&mut self.driver, &record, &ctx, &self.cancel)
                .await;
            stats.captcha_pauses += report.captcha_pauses;

            match report.outcome {
                RowOutcome::Published { url } => {
                    backlog.mark_done(row_id)?;
                    backlog.set_link(row_id, &url)?;
                    stats.published += 1;
                    self.pacer.record_publish();
                    if report.with_image || record.photo_url().is_none() {
                        info!("{} ✅ 发布成功: {}", ctx, url);
                    } else {
                        stats.images_dropped += 1;
                        info!("{} ✅ 发布成功（图片下载失败，未带图片）: {}", ctx, url);
                    }
                    info!(
                        target: PUBLISHED_TARGET,
                        "✔ Publicado: {} ({})",
                        truncate_text(&record.titulo, 80),
                        url
                    );
                }
                RowOutcome::ValidationFailed | RowOutcome::Errored(_) => {
                    stats.failed += 1;
                }
                RowOutcome::Cancelled => {
                    return Ok(BatchControl::Cancelled);
                }
            }
            pb.inc(1);

            if !self.pacer.after_row(&self.cancel).await {
                return Ok(BatchControl::Cancelled);
            }
        }
        Ok(BatchControl::Continue)
    }

    /// 保存整张表；失败即中止运行
    fn checkpoint(&self, backlog: &Backlog, batch: &Batch) -> Result<(), AppError> {
        match self.store.save(backlog) {
            Ok(()) => {
                info!(
                    "{}",
                    format!(
                        "💾 第 {} 批进度已保存: {}",
                        batch.number,
                        self.store.location().display()
                    )
                    .green()
                );
                Ok(())
            }
            Err(e) => {
                error!("❌ 保存进度失败: {}", e);
                Err(e.into())
            }
        }
    }

    async fn cleanup(&mut self) {
        if let Err(e) = self.driver.close().await {
            warn!("⚠️ 关闭浏览器会话失败: {}", e);
        }
        match self.flow.fetcher().clear_cache() {
            Ok(removed) => debug!("🧹 已清理 {} 个缓存图片", removed),
            Err(e) => warn!(
                "⚠️ 清理图片缓存失败 ({}): {}",
                self.flow.fetcher().dest_dir().display(),
                e
            ),
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_batch_start(batch: &Batch, total_batches: usize) {
    info!("\n{}", "=".repeat(60));
    info!(
        "{}",
        format!(
            "📦 开始处理第 {}/{} 批 ({} 条)",
            batch.number,
            total_batches,
            batch.len()
        )
        .cyan()
        .bold()
    );
    info!("{}", "=".repeat(60));
}

fn print_final_stats(stats: &RunStats) {
    info!("\n{}", "=".repeat(60));
    info!("📊 发布完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("{}", format!("✅ 已发布: {}/{}", stats.published, stats.pending).green());
    info!("{}", format!("❌ 失败: {}", stats.failed).red());
    info!("🧩 验证码暂停: {}", stats.captcha_pauses);
    if stats.images_dropped > 0 {
        info!("{}", format!("🖼️ 未带图片发布: {}", stats.images_dropped).yellow());
    }
    info!("⏭️ 跳过（已发布）: {}", stats.skipped);
    info!("⏱️ 用时: {}", format_duration(stats.elapsed));
    if stats.cancelled {
        info!("{}", "⏹️ 运行被取消".yellow());
    }
    info!("{}", "=".repeat(60));
}
