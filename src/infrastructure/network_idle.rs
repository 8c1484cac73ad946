//! 网络空闲检测
//!
//! 监听 CDP 网络事件统计进行中的请求。`readyState` 为 complete 之后，
//! 表单提交的 XHR 往往还在路上，只有请求都结束并安静一段时间才算页面稳定。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::error::PublishError;

/// 没有新请求持续这么久才算空闲
pub const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// 超过这个时长仍未结束的请求（长轮询、推送连接）不再阻塞空闲判断
pub const LONG_LIVED_AFTER: Duration = Duration::from_secs(10);

/// 进行中的请求
#[derive(Debug)]
pub struct InFlight {
    pending: HashMap<String, Instant>,
    last_change: Instant,
}

impl InFlight {
    pub fn new(now: Instant) -> Self {
        Self {
            pending: HashMap::new(),
            last_change: now,
        }
    }

    /// 重定向会用同一个 id 再发一次，只记第一次
    pub fn started(&mut self, request_id: &str, now: Instant) {
        self.pending.entry(request_id.to_string()).or_insert(now);
        self.last_change = now;
    }

    pub fn finished(&mut self, request_id: &str, now: Instant) {
        if self.pending.remove(request_id).is_some() {
            self.last_change = now;
        }
    }

    /// 仍在阻塞空闲判断的请求数
    pub fn blocking(&self, now: Instant) -> usize {
        self.pending
            .values()
            .filter(|started| now.saturating_duration_since(**started) < LONG_LIVED_AFTER)
            .count()
    }

    pub fn is_quiet(&self, now: Instant, window: Duration) -> bool {
        self.blocking(now) == 0 && now.saturating_duration_since(self.last_change) >= window
    }

    /// 导航到新页面时清空，旧页面的请求不一定会再有结束事件
    pub fn reset(&mut self, now: Instant) {
        self.pending.clear();
        self.last_change = now;
    }
}

/// 挂在页面上的网络监听任务
pub struct NetworkMonitor {
    state: Arc<Mutex<InFlight>>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    pub async fn attach(page: &Page) -> Result<Self, PublishError> {
        let mut sent = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = page.event_listener::<EventLoadingFailed>().await?;

        let state = Arc::new(Mutex::new(InFlight::new(Instant::now())));
        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = sent.next() => {
                        lock(&shared).started(event.request_id.inner(), Instant::now());
                    }
                    Some(event) = finished.next() => {
                        lock(&shared).finished(event.request_id.inner(), Instant::now());
                    }
                    Some(event) = failed.next() => {
                        lock(&shared).finished(event.request_id.inner(), Instant::now());
                    }
                    else => break,
                }
            }
            debug!("网络事件流已结束");
        });

        Ok(Self { state, task })
    }

    pub fn is_quiet(&self) -> bool {
        lock(&self.state).is_quiet(Instant::now(), QUIET_WINDOW)
    }

    pub fn blocking(&self) -> usize {
        lock(&self.state).blocking(Instant::now())
    }

    pub fn reset(&self) {
        lock(&self.state).reset(Instant::now());
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(state: &Mutex<InFlight>) -> MutexGuard<'_, InFlight> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
