use std::path::PathBuf;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::BrowserSession;

/// 启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// 无头模式；需要人工处理验证码时应关闭
    pub headless: bool,
    /// 浏览器可执行文件，`None` 时自动查找
    pub executable: Option<PathBuf>,
    pub user_agent: String,
    /// 窗口尺寸（移动端视口）
    pub window_size: (u32, u32),
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            user_agent: super::random_mobile_user_agent().to_string(),
            window_size: (390, 844),
        }
    }
}

/// 启动浏览器并打开一个空白页
pub async fn launch_browser(options: &LaunchOptions) -> Result<BrowserSession> {
    info!(
        "🚀 启动浏览器 ({})...",
        if options.headless { "无头模式" } else { "有界面模式" }
    );
    debug!("User-Agent: {}", options.user_agent);

    let mut builder = BrowserConfig::builder();
    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &options.executable {
        builder = builder.chrome_executable(executable);
    }

    let (width, height) = options.window_size;
    let config = builder
        .window_size(width, height)
        .args(vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--user-agent={}", options.user_agent),
        ])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            anyhow::anyhow!("配置浏览器失败: {}", e)
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow::anyhow!("启动浏览器失败: {}", e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        anyhow::anyhow!("创建页面失败: {}", e)
    })?;

    info!("✅ 浏览器已就绪");

    Ok(BrowserSession {
        browser,
        page,
        handler,
        owned: true,
        page_owned: true,
    })
}
