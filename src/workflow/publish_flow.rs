//! 广告发布流程 - 流程层
//!
//! 核心职责：定义"一条广告"的完整处理流程
//!
//! 流程顺序：
//! 1. 下载图片（失败则不带图片继续）
//! 2. 表单驱动发布
//! 3. 遇到验证码 → 等待操作员 → 重试同一条广告
//!
//! 没有操作员可用时不会立即重试，而是取消整个运行，进度照常保存。
//!
//! 不持有浏览器会话，由编排层把 `FormDriver` 借给本流程。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::PublishError;
use crate::models::{AdPayload, AdRecord};
use crate::services::{AssetFetcher, CaptchaGate, FormDriver, PublishOutcome};
use crate::utils::logging::truncate_text;
use crate::workflow::row_ctx::RowCtx;

/// 单条广告的处理结果
#[derive(Debug)]
pub enum RowOutcome {
    /// 发布成功，附带帖子地址
    Published { url: String },
    /// 表单校验失败，保持待发布
    ValidationFailed,
    /// 浏览器操作出错，保持待发布
    Errored(PublishError),
    /// 运行被取消，保持待发布
    Cancelled,
}

/// 单条广告的处理报告
#[derive(Debug)]
pub struct RowReport {
    pub outcome: RowOutcome,
    /// 本行遇到验证码的次数
    pub captcha_pauses: usize,
    /// 是否带图片提交
    pub with_image: bool,
}

impl RowReport {
    fn new(outcome: RowOutcome, captcha_pauses: usize, with_image: bool) -> Self {
        Self {
            outcome,
            captcha_pauses,
            with_image,
        }
    }
}

/// 广告发布流程
pub struct PublishFlow {
    fetcher: AssetFetcher,
    gate: Arc<dyn CaptchaGate>,
}

impl PublishFlow {
    pub fn new(fetcher: AssetFetcher, gate: Arc<dyn CaptchaGate>) -> Self {
        Self { fetcher, gate }
    }

    pub fn fetcher(&self) -> &AssetFetcher {
        &self.fetcher
    }

    pub async fn run(
        &self,
        driver: &mut FormDriver,
        record: &AdRecord,
        ctx: &RowCtx,
        cancel: &CancellationToken,
    ) -> RowReport {
        info!("{} 📝 {}", ctx, truncate_text(&ctx.title, 50));

        let mut payload = AdPayload::from_record(record);

        if let Some(url) = record.photo_url() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return RowReport::new(RowOutcome::Cancelled, 0, false);
                }
                fetched = self.fetcher.fetch(url) => {
                    match fetched {
                        Ok(path) => payload.photo = Some(path),
                        Err(e) => warn!("{} ⚠️ 图片下载失败，不带图片发布: {}", ctx, e),
                    }
                }
            }
        }
        let with_image = payload.photo.is_some();

        let mut captcha_pauses = 0;
        loop {
            match driver.publish(&payload).await {
                Ok(PublishOutcome::Published { url }) => {
                    return RowReport::new(
                        RowOutcome::Published { url },
                        captcha_pauses,
                        with_image,
                    );
                }
                Ok(PublishOutcome::ValidationFailed) => {
                    warn!("{} ❌ 表单校验失败，保持待发布", ctx);
                    return RowReport::new(RowOutcome::ValidationFailed, captcha_pauses, with_image);
                }
                Ok(PublishOutcome::CaptchaPaused) => {
                    captcha_pauses += 1;
                    warn!("{} 🧩 验证码出现，暂停等待人工处理", ctx);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            warn!("{} ⏹️ 等待验证码时收到取消，本行保持待发布", ctx);
                            return RowReport::new(RowOutcome::Cancelled, captcha_pauses, with_image);
                        }
                        resolved = self.gate.wait_for_resolution(&ctx.title) => match resolved {
                            Ok(()) => info!("{} 🔁 重试本行", ctx),
                            Err(e) => {
                                error!("{} ⛔ {}，停止运行", ctx, e);
                                cancel.cancel();
                                return RowReport::new(RowOutcome::Errored(e), captcha_pauses, with_image);
                            }
                        },
                    }
                }
                Err(e) => {
                    warn!("{} ❌ 发布出错，保持待发布: {}", ctx, e);
                    return RowReport::new(RowOutcome::Errored(e), captcha_pauses, with_image);
                }
            }
        }
    }
}
