//! 发布节奏控制
//!
//! - 每处理一行后随机等待 `[delay_min, delay_max]`
//! - 每批内每处理 20 行额外冷却 60 秒
//! - 可选每小时发布上限，达到后等到窗口滚动
//!
//! 所有等待都可被取消令牌唤醒。

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const HOUR: Duration = Duration::from_secs(3600);

/// 节奏参数
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub cooldown_every: usize,
    pub cooldown: Duration,
    pub max_per_hour: Option<usize>,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            delay_min: Duration::from_secs(3),
            delay_max: Duration::from_secs(7),
            cooldown_every: 20,
            cooldown: Duration::from_secs(60),
            max_per_hour: None,
        }
    }
}

impl PacingPolicy {
    /// 不做任何等待（测试用）
    pub fn immediate() -> Self {
        Self {
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            cooldown_every: 0,
            cooldown: Duration::ZERO,
            max_per_hour: None,
        }
    }
}

/// 节奏控制器
#[derive(Debug)]
pub struct Pacer {
    policy: PacingPolicy,
    attempted_in_batch: usize,
    recent_posts: VecDeque<Instant>,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            attempted_in_batch: 0,
            recent_posts: VecDeque::new(),
        }
    }

    /// 新批次开始，冷却计数清零
    pub fn start_batch(&mut self) {
        self.attempted_in_batch = 0;
    }

    /// 记录一次成功发布（用于每小时上限）
    pub fn record_publish(&mut self) {
        self.recent_posts.push_back(Instant::now());
    }

    /// 一行处理完之后的等待；被取消返回 `false`
    pub async fn after_row(&mut self, cancel: &CancellationToken) -> bool {
        self.attempted_in_batch += 1;

        let delay = self.random_delay();
        if !delay.is_zero() {
            debug!("⏳ 等待 {:.1} 秒", delay.as_secs_f64());
            if !cancellable_sleep(delay, cancel).await {
                return false;
            }
        }

        let every = self.policy.cooldown_every;
        if every > 0 && self.attempted_in_batch % every == 0 && !self.policy.cooldown.is_zero() {
            info!(
                "☕ 已处理 {} 行，冷却 {} 秒",
                self.attempted_in_batch,
                self.policy.cooldown.as_secs()
            );
            if !cancellable_sleep(self.policy.cooldown, cancel).await {
                return false;
            }
        }
        true
    }

    /// 达到每小时上限时等待窗口滚动；被取消返回 `false`
    pub async fn wait_for_hourly_slot(&mut self, cancel: &CancellationToken) -> bool {
        let Some(cap) = self.policy.max_per_hour else {
            return true;
        };
        if cap == 0 {
            return true;
        }

        loop {
            let now = Instant::now();
            while self
                .recent_posts
                .front()
                .is_some_and(|t| now.duration_since(*t) >= HOUR)
            {
                self.recent_posts.pop_front();
            }

            if self.recent_posts.len() < cap {
                return true;
            }

            let Some(oldest) = self.recent_posts.front().copied() else {
                return true;
            };
            let wait = HOUR.saturating_sub(now.duration_since(oldest));
            info!(
                "⏸️ 已达到每小时 {} 条上限，等待 {} 分钟",
                cap,
                wait.as_secs().div_ceil(60)
            );
            if !cancellable_sleep(wait, cancel).await {
                return false;
            }
        }
    }

    fn random_delay(&self) -> Duration {
        let (min, max) = (self.policy.delay_min, self.policy.delay_max);
        if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        }
    }
}

/// 可取消的等待；睡满返回 `true`，被取消返回 `false`
pub async fn cancellable_sleep(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min: u64, max: u64) -> PacingPolicy {
        PacingPolicy {
            delay_min: Duration::from_secs(min),
            delay_max: Duration::from_secs(max),
            ..PacingPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_within_window() {
        let mut pacer = Pacer::new(policy(3, 7));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert!(pacer.after_row(&cancel).await);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed <= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_every_twentieth_row() {
        let mut pacer = Pacer::new(policy(1, 1));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..19 {
            assert!(pacer.after_row(&cancel).await);
        }
        assert_eq!(start.elapsed(), Duration::from_secs(19));

        assert!(pacer.after_row(&cancel).await);
        assert_eq!(start.elapsed(), Duration::from_secs(20 + 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_counter_resets_per_batch() {
        let mut pacer = Pacer::new(policy(0, 0));
        let cancel = CancellationToken::new();

        for _ in 0..19 {
            pacer.after_row(&cancel).await;
        }
        pacer.start_batch();

        let start = Instant::now();
        pacer.after_row(&cancel).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wakes_sleep() {
        let mut pacer = Pacer::new(policy(600, 600));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert!(!pacer.after_row(&cancel).await);
        assert!(start.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_cap_waits_for_window() {
        let mut pacer = Pacer::new(PacingPolicy {
            max_per_hour: Some(2),
            ..PacingPolicy::immediate()
        });
        let cancel = CancellationToken::new();

        pacer.record_publish();
        sleep(Duration::from_secs(600)).await;
        pacer.record_publish();

        let start = Instant::now();
        assert!(pacer.wait_for_hourly_slot(&cancel).await);
        assert_eq!(start.elapsed(), Duration::from_secs(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_cap_not_reached() {
        let mut pacer = Pacer::new(PacingPolicy {
            max_per_hour: Some(5),
            ..PacingPolicy::immediate()
        });
        let cancel = CancellationToken::new();
        pacer.record_publish();

        let start = Instant::now();
        assert!(pacer.wait_for_hourly_slot(&cancel).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
