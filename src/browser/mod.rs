//! 浏览器会话
//!
//! 两种获取方式：自己启动一个浏览器，或连接到已经打开调试端口的浏览器。
//! 连接模式适合需要人工登录或反复处理验证码的场景。

pub mod connection;
pub mod headless;

use chromiumoxide::{Browser, Page};
use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;

pub use connection::connect_to_browser_and_page;
pub use headless::{launch_browser, LaunchOptions};

/// 移动端 User-Agent，启动时随机选一个
pub const MOBILE_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Linux; Android 10; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 9; Mi A2 Lite) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPad; CPU OS 15_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.5 Mobile/15E148 Safari/604.1",
];

pub fn random_mobile_user_agent() -> &'static str {
    MOBILE_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(MOBILE_USER_AGENTS[0])
}

/// 一次运行使用的浏览器会话
pub struct BrowserSession {
    pub browser: Browser,
    pub page: Page,
    /// 后台事件循环
    pub handler: JoinHandle<()>,
    /// 浏览器是否由本程序启动（决定结束时是否关闭浏览器进程）
    pub owned: bool,
    /// 标签页是否由本程序新建（连接模式下决定结束时是否关闭它）
    pub page_owned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent_is_from_pool() {
        for _ in 0..20 {
            assert!(MOBILE_USER_AGENTS.contains(&random_mobile_user_agent()));
        }
    }
}
