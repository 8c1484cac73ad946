//! 验证码人工处理
//!
//! 遇到验证码时暂停，等操作员在浏览器里处理完再继续同一条广告。
//!
//! 标准输入由一个专用线程读取，按行送进通道。tokio 的 stdin 跑在阻塞线程池上，
//! 读到一半无法取消，会让运行时关闭时卡住直到有人按 Enter。

use std::io::BufRead;
use std::thread;

use async_trait::async_trait;
use colored::Colorize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::PublishError;

/// 等待操作员确认验证码已处理
#[async_trait]
pub trait CaptchaGate: Send + Sync {
    /// 返回 `Ok` 表示可以重试；没有超时，取消由调用方负责
    ///
    /// 没有操作员可用时返回 `PublishError::OperatorUnavailable`，调用方不应立即重试。
    async fn wait_for_resolution(&self, title: &str) -> Result<(), PublishError>;
}

/// 按行读取操作员输入
pub struct StdinGate {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl StdinGate {
    /// 启动专用线程读取标准输入
    ///
    /// 线程在标准输入关闭时结束；进程退出不会等待它。
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawned = thread::Builder::new()
            .name("captcha-stdin".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("读取标准输入失败: {}", e);
                            break;
                        }
                    }
                }
                debug!("标准输入已关闭");
            });
        if let Err(e) = spawned {
            warn!("无法启动标准输入线程: {}", e);
        }
        Self::from_lines(rx)
    }

    /// 由任意行来源构建，发送端全部关闭即视为输入结束
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
        }
    }
}

#[async_trait]
impl CaptchaGate for StdinGate {
    async fn wait_for_resolution(&self, title: &str) -> Result<(), PublishError> {
        let mut lines = self.lines.lock().await;

        // 验证码出现之前敲的回车不算确认
        while let Ok(stale) = lines.try_recv() {
            debug!("丢弃提前输入: {:?}", stale);
        }

        warn!("🧩 检测到验证码: {}", title);
        println!(
            "{}",
            "请在浏览器中完成验证码，然后按 Enter 继续...".yellow().bold()
        );

        match lines.recv().await {
            Some(_) => {
                info!("▶️ 继续发布");
                Ok(())
            }
            None => {
                warn!("标准输入已关闭，无法等待人工处理");
                Err(PublishError::OperatorUnavailable)
            }
        }
    }
}
