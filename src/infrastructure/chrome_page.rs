//! Chromium 页面 - 基础设施层
//!
//! 持有唯一的 Page 资源，通过 CDP 和页面内 JS 实现 `PageDriver` 原语。

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, SetCookiesParams, TimeSinceEpoch,
};
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::browser::BrowserSession;
use crate::error::PublishError;
use crate::infrastructure::network_idle::NetworkMonitor;
use crate::infrastructure::page_driver::{ElementHandle, PageDriver, SessionCookie};

/// 页面导航默认超时
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// 关闭会话时要释放的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// 自己启动的浏览器，连进程一起关闭
    Browser,
    /// 连接模式下自己新建的标签页
    Page,
    /// 复用的用户标签页，只断开连接
    Detach,
}

impl Teardown {
    fn for_session(owned: bool, page_owned: bool) -> Self {
        match (owned, page_owned) {
            (true, _) => Teardown::Browser,
            (false, true) => Teardown::Page,
            (false, false) => Teardown::Detach,
        }
    }
}

/// Chromium 页面
pub struct ChromePage {
    page: Page,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    teardown: Teardown,
    navigation_timeout: Duration,
    /// 首次导航时挂上；挂载失败则退回只检查 readyState
    network: Option<NetworkMonitor>,
    network_attempted: bool,
    closed: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    tag: String,
    #[serde(rename = "type")]
    input_type: Option<String>,
}

impl ChromePage {
    /// 接管整个浏览器会话
    pub fn from_session(session: BrowserSession) -> Self {
        Self {
            page: session.page,
            browser: Some(session.browser),
            handler: Some(session.handler),
            teardown: Teardown::for_session(session.owned, session.page_owned),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            network: None,
            network_attempted: false,
            closed: false,
        }
    }

    async fn watch_network(&mut self) {
        if self.network_attempted {
            return;
        }
        self.network_attempted = true;
        match NetworkMonitor::attach(&self.page).await {
            Ok(monitor) => self.network = Some(monitor),
            Err(e) => warn!("无法监听网络请求，只按 readyState 判断页面稳定: {}", e),
        }
    }

    /// 按会话来源关闭浏览器或标签页
    async fn shut_down(&mut self) -> Result<(), PublishError> {
        match self.teardown {
            Teardown::Browser => {
                let Some(mut browser) = self.browser.take() else {
                    return Ok(());
                };
                let closed = browser.close().await.map(|_| ());
                if closed.is_err() {
                    // CDP 已断开时 close 发不出去，直接结束子进程免得 wait 卡住
                    if let Some(Err(e)) = browser.kill().await {
                        warn!("结束浏览器进程失败: {}", e);
                    }
                }
                if let Err(e) = browser.wait().await {
                    warn!("等待浏览器进程退出失败: {}", e);
                }
                Ok(closed?)
            }
            Teardown::Page => Ok(self.page.clone().close().await?),
            Teardown::Detach => Ok(()),
        }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, PublishError> {
        let result = self.page.evaluate(js_code.into()).await?;
        result
            .into_value()
            .map_err(|e| PublishError::browser("eval", e))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, PublishError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| PublishError::browser("eval", e))
    }

    /// 在选择器对应的元素上执行一段 JS，元素不存在时报错
    async fn with_element(
        &self,
        action: &str,
        element: &ElementHandle,
        body: &str,
    ) -> Result<(), PublishError> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.querySelector({selector});
                if (!el) {{ return false; }}
                {body}
                return true;
            }})()
            "#,
            selector = js_string(&element.selector)?,
            body = body
        );

        let found: bool = self.eval_as(js_code).await?;
        if found {
            Ok(())
        } else {
            Err(PublishError::browser(
                action,
                format!("元素已消失: {}", element.selector),
            ))
        }
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&mut self, url: &str) -> Result<(), PublishError> {
        debug!("导航到: {}", url);
        self.watch_network().await;
        if let Some(network) = &self.network {
            network.reset();
        }
        timeout(self.navigation_timeout, self.page.goto(url))
            .await
            .map_err(|_| PublishError::Timeout(self.navigation_timeout))??;
        Ok(())
    }

    async fn query(&mut self, selector: &str) -> Result<Option<ElementHandle>, PublishError> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) {{ return null; }}
                return {{ tag: el.tagName.toLowerCase(), type: el.getAttribute('type') }};
            }})()
            "#,
            js_string(selector)?
        );

        let found: Option<QueryResult> = self.eval_as(js_code).await?;
        Ok(found.map(|r| {
            let handle = ElementHandle::new(selector, r.tag);
            match r.input_type {
                Some(t) => handle.with_input_type(t),
                None => handle,
            }
        }))
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> Result<(), PublishError> {
        let body = format!(
            r#"
                el.focus();
                el.value = {};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            "#,
            js_string(value)?
        );
        self.with_element("fill", element, &body).await
    }

    async fn select_option(
        &mut self,
        element: &ElementHandle,
        label: &str,
    ) -> Result<(), PublishError> {
        let body = format!(
            r#"
                const wanted = {}.trim().toLowerCase();
                const option = Array.from(el.options || [])
                    .find(o => o.text.trim().toLowerCase() === wanted);
                if (!option) {{ throw new Error('选项不存在: ' + wanted); }}
                el.value = option.value;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            "#,
            js_string(label)?
        );
        self.with_element("select_option", element, &body).await
    }

    async fn set_file(&mut self, element: &ElementHandle, path: &Path) -> Result<(), PublishError> {
        let absolute = path
            .canonicalize()
            .map_err(|e| PublishError::browser("set_file", e))?;

        let node = self.page.find_element(element.selector.as_str()).await?;
        let params = SetFileInputFilesParams::builder()
            .files(vec![absolute.to_string_lossy().to_string()])
            .backend_node_id(node.backend_node_id)
            .build()
            .map_err(|e| PublishError::browser("set_file", e))?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), PublishError> {
        self.page
            .find_element(element.selector.as_str())
            .await?
            .click()
            .await?;
        Ok(())
    }

    async fn wait_for_idle(&mut self, max_wait: Duration) -> Result<(), PublishError> {
        let deadline = Instant::now() + max_wait;
        loop {
            // 导航过程中执行上下文可能暂时不可用，忽略这类错误继续轮询
            let state: Option<String> = self.eval_as("document.readyState").await.ok();
            if state.as_deref() == Some("complete") {
                match &self.network {
                    Some(network) if network.is_quiet() => return Ok(()),
                    Some(_) => {}
                    None => {
                        // 没有网络事件可用，给页面内的异步请求一点收尾时间
                        sleep(Duration::from_millis(500)).await;
                        return Ok(());
                    }
                }
            }
            if Instant::now() >= deadline {
                let pending = self.network.as_ref().map_or(0, NetworkMonitor::blocking);
                warn!(
                    "页面在 {:?} 内未稳定 (readyState: {:?}, 未完成请求: {})",
                    max_wait, state, pending
                );
                return Err(PublishError::Timeout(max_wait));
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    async fn current_url(&mut self) -> Result<String, PublishError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn body_text(&mut self) -> Result<String, PublishError> {
        self.eval_as("document.body ? document.body.innerText : ''")
            .await
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, PublishError> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies.into_iter().map(session_cookie).collect())
    }

    async fn set_cookies(&mut self, cookies: &[SessionCookie]) -> Result<(), PublishError> {
        if cookies.is_empty() {
            return Ok(());
        }
        // 直接走 CDP，`Page::set_cookies` 在 about:blank 上会拒绝
        let params = SetCookiesParams::new(cookies.iter().map(cookie_param).collect());
        self.page.execute(params).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.network = None;

        let handler = self.handler.take();
        let result = stop_after(self.shut_down(), handler).await;
        debug!("浏览器会话已释放 ({:?})", self.teardown);
        result
    }
}

/// 执行关闭步骤，无论成败都停止事件循环
async fn stop_after(
    closing: impl Future<Output = Result<(), PublishError>>,
    handler: Option<JoinHandle<()>>,
) -> Result<(), PublishError> {
    let result = closing.await;
    if let Some(handler) = handler {
        handler.abort();
    }
    result
}

fn session_cookie(cookie: Cookie) -> SessionCookie {
    let expires = (!cookie.session && cookie.expires > 0.0).then_some(cookie.expires);
    SessionCookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires,
        secure: cookie.secure,
        http_only: cookie.http_only,
        same_site: cookie.same_site.map(|s| s.as_ref().to_string()),
    }
}

fn cookie_param(cookie: &SessionCookie) -> CookieParam {
    let mut param = CookieParam::new(cookie.name.clone(), cookie.value.clone());
    param.domain = Some(cookie.domain.clone());
    param.path = Some(cookie.path.clone());
    param.secure = Some(cookie.secure);
    param.http_only = Some(cookie.http_only);
    param.same_site = cookie
        .same_site
        .as_deref()
        .and_then(|s| s.parse::<CookieSameSite>().ok());
    param.expires = cookie.expires.map(TimeSinceEpoch::new);
    param
}

/// 把字符串编码为 JS 字符串字面量
fn js_string(value: &str) -> Result<String, PublishError> {
    serde_json::to_string(value).map_err(|e| PublishError::browser("encode", e))
}
