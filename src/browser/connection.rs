use anyhow::Result;
use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::BrowserSession;

/// 连接到已经打开调试端口的浏览器
///
/// 如果指定了 `target_title`，优先复用标题匹配的标签页（例如已经登录的页面），
/// 否则新建一个空白页。浏览器进程不归本程序所有，结束时只关闭自己新建的标签页。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_title: Option<&str>,
) -> Result<BrowserSession> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

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

    if let Some(title) = target_title {
        let pages = browser.pages().await?;
        debug!("正在 {} 个页面中查找标题包含 '{}' 的页面", pages.len(), title);
        for p in pages.iter() {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 复用已有页面: {}", page_title);
                    return Ok(BrowserSession {
                        browser,
                        page: p.clone(),
                        handler,
                        owned: false,
                        page_owned: false,
                    });
                }
            }
        }
        debug!("未找到匹配的页面，将创建新页面");
    }

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        e
    })?;

    Ok(BrowserSession {
        browser,
        page,
        handler,
        owned: false,
        page_owned: true,
    })
}
