//! 测试公共设施：脚本化的假页面、计数存储、计数验证码闸门

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use revolico_publisher::error::{AppError, PublishError, StoreError};
use revolico_publisher::infrastructure::{ElementHandle, PageDriver, SessionCookie};
use revolico_publisher::models::{load_backlog, save_backlog, Backlog, BacklogStore, Column, CsvStore};
use revolico_publisher::orchestrator::{Pacer, PacingPolicy, Publisher};
use revolico_publisher::services::{AssetFetcher, CaptchaGate, FormDriver, RetryPolicy};
use revolico_publisher::workflow::PublishFlow;

pub const FORM_URL: &str = "https://revolico.test/publicar";

// ========== 假页面 ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Navigate(String),
    Fill { selector: String, value: String },
    Select { selector: String, label: String },
    SetFile { selector: String, path: PathBuf },
    Click(String),
}

/// 每次导航后验证码出现的时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Captcha {
    #[default]
    None,
    OnLoad,
    AfterSubmit,
}

/// 每次提交后页面显示的提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Submission {
    #[default]
    Success,
    Error,
    Ambiguous,
    Both,
    /// 前 n 次读取页面时还没有任何提示，之后显示成功
    Late(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Blank,
    Form,
    Result,
}

#[derive(Default)]
pub struct PageScript {
    /// 按导航顺序消费，用完后不再出现验证码
    pub captchas: VecDeque<Captcha>,
    /// 按提交顺序消费，用完后都是成功
    pub submissions: VecDeque<Submission>,
    /// 选择器包含这些片段的元素不存在
    pub missing: Vec<&'static str>,
    /// 第 n 次提交后取消令牌
    pub cancel_after_submits: Option<(usize, CancellationToken)>,
    /// 网络一直不空闲，等待总是超时
    pub never_idle: bool,
}

pub struct FakeState {
    script: PageScript,
    phase: Phase,
    captcha: Captcha,
    submission: Submission,
    /// 本次提交后读取页面文字的次数
    result_reads: usize,
    pub events: Vec<PageEvent>,
    pub submits: usize,
    pub closes: usize,
    /// 浏览器里当前的 cookie
    pub cookies: Vec<SessionCookie>,
}

#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new(script: PageScript) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                script,
                phase: Phase::Blank,
                captcha: Captcha::None,
                submission: Submission::Success,
                result_reads: 0,
                events: Vec::new(),
                submits: 0,
                closes: 0,
                cookies: Vec::new(),
            })),
        }
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn submits(&self) -> usize {
        self.state.lock().unwrap().submits
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn browser_cookies(&self) -> Vec<SessionCookie> {
        self.state.lock().unwrap().cookies.clone()
    }

    /// 模拟网站在运行期间下发的 cookie（例如登录后）
    pub fn receive_cookie(&self, cookie: SessionCookie) {
        upsert_cookie(&mut self.state.lock().unwrap().cookies, cookie);
    }

    pub fn result_reads(&self) -> usize {
        self.state.lock().unwrap().result_reads
    }

    pub fn navigations(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PageEvent::Navigate(_)))
            .count()
    }

    /// 所有填写过的文本值
    pub fn filled_values(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PageEvent::Fill { value, .. } => Some(value),
                PageEvent::Select { label, .. } => Some(label),
                _ => None,
            })
            .collect()
    }

    pub fn uploaded_files(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PageEvent::SetFile { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: PageEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

impl FakeState {
    fn shows_success(&self) -> bool {
        match self.submission {
            Submission::Success | Submission::Both => true,
            Submission::Late(n) => self.result_reads > n,
            Submission::Error | Submission::Ambiguous => false,
        }
    }

    fn shows_error(&self) -> bool {
        matches!(self.submission, Submission::Error | Submission::Both)
    }
}

fn upsert_cookie(jar: &mut Vec<SessionCookie>, cookie: SessionCookie) {
    jar.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
    jar.push(cookie);
}

pub fn cookie(name: &str, value: &str) -> SessionCookie {
    SessionCookie {
        name: name.to_string(),
        value: value.to_string(),
        domain: ".revolico.test".to_string(),
        path: "/".to_string(),
        expires: Some(1_900_000_000.0),
        secure: true,
        http_only: true,
        same_site: Some("Lax".to_string()),
    }
}

fn infer_element(selector: &str) -> ElementHandle {
    if selector.contains("type='file'") {
        ElementHandle::new(selector, "input").with_input_type("file")
    } else if selector.starts_with("select") {
        ElementHandle::new(selector, "select")
    } else if selector.starts_with("textarea") {
        ElementHandle::new(selector, "textarea")
    } else if selector.starts_with("button") {
        ElementHandle::new(selector, "button")
    } else {
        ElementHandle::new(selector, "input")
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<(), PublishError> {
        let mut state = self.state.lock().unwrap();
        state.phase = Phase::Form;
        state.captcha = state.script.captchas.pop_front().unwrap_or_default();
        state.events.push(PageEvent::Navigate(url.to_string()));
        Ok(())
    }

    async fn query(&mut self, selector: &str) -> Result<Option<ElementHandle>, PublishError> {
        let state = self.state.lock().unwrap();
        if state.script.missing.iter().any(|m| selector.contains(m)) {
            return Ok(None);
        }

        let present = if selector.contains("captcha") {
            matches!(
                (state.phase, state.captcha),
                (Phase::Form, Captcha::OnLoad) | (Phase::Result, Captcha::AfterSubmit)
            )
        } else if selector.contains("publish-success") {
            state.phase == Phase::Result && state.shows_success()
        } else if selector.contains("publish-error") {
            state.phase == Phase::Result && state.shows_error()
        } else {
            state.phase == Phase::Form
        };

        Ok(present.then(|| infer_element(selector)))
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> Result<(), PublishError> {
        self.record(PageEvent::Fill {
            selector: element.selector.clone(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn select_option(
        &mut self,
        element: &ElementHandle,
        label: &str,
    ) -> Result<(), PublishError> {
        self.record(PageEvent::Select {
            selector: element.selector.clone(),
            label: label.to_string(),
        });
        Ok(())
    }

    async fn set_file(&mut self, element: &ElementHandle, path: &Path) -> Result<(), PublishError> {
        self.record(PageEvent::SetFile {
            selector: element.selector.clone(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), PublishError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(PageEvent::Click(element.selector.clone()));
        if element.selector.contains("submit") {
            state.submits += 1;
            state.phase = Phase::Result;
            state.submission = state.script.submissions.pop_front().unwrap_or_default();
            state.result_reads = 0;
            if let Some((n, token)) = &state.script.cancel_after_submits {
                if state.submits == *n {
                    token.cancel();
                }
            }
        }
        Ok(())
    }

    async fn wait_for_idle(&mut self, timeout: Duration) -> Result<(), PublishError> {
        if self.state.lock().unwrap().script.never_idle {
            return Err(PublishError::Timeout(timeout));
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, PublishError> {
        let state = self.state.lock().unwrap();
        Ok(match state.phase {
            Phase::Result => format!("https://revolico.test/item/{}", state.submits),
            _ => FORM_URL.to_string(),
        })
    }

    async fn body_text(&mut self) -> Result<String, PublishError> {
        let mut state = self.state.lock().unwrap();
        if state.phase != Phase::Result {
            return Ok(String::new());
        }
        state.result_reads += 1;
        Ok(match state.submission {
            Submission::Error => "Error: precio inválido",
            Submission::Both => "Publicado con error en la imagen",
            _ if state.shows_success() => "¡Gracias! Su anuncio fue publicado",
            _ => "Mis anuncios",
        }
        .to_string())
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, PublishError> {
        Ok(self.state.lock().unwrap().cookies.clone())
    }

    async fn set_cookies(&mut self, cookies: &[SessionCookie]) -> Result<(), PublishError> {
        let mut state = self.state.lock().unwrap();
        for cookie in cookies {
            upsert_cookie(&mut state.cookies, cookie.clone());
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

// ========== 存储 ==========

/// 统计保存次数的 CSV 存储，可让第 n 次保存失败
pub struct CountingStore {
    inner: CsvStore,
    pub saves: Arc<AtomicUsize>,
    fail_on_save: Option<usize>,
}

impl CountingStore {
    pub fn new(path: &Path) -> Self {
        Self {
            inner: CsvStore::new(path),
            saves: Arc::new(AtomicUsize::new(0)),
            fail_on_save: None,
        }
    }

    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_save = Some(n);
        self
    }
}

impl BacklogStore for CountingStore {
    fn load(&self) -> Result<Backlog, AppError> {
        self.inner.load()
    }

    fn save(&self, backlog: &Backlog) -> Result<(), StoreError> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_save == Some(n) {
            return Err(StoreError::Io {
                path: self.inner.location().to_path_buf(),
                source: io::Error::other("磁盘已满"),
            });
        }
        self.inner.save(backlog)
    }

    fn location(&self) -> &Path {
        self.inner.location()
    }
}

// ========== 验证码闸门 ==========

/// 统计调用次数；配置了令牌时取消令牌并一直等待
#[derive(Default)]
pub struct CountingGate {
    pub calls: AtomicUsize,
    cancel: Option<CancellationToken>,
    closed: bool,
}

impl CountingGate {
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..Default::default()
        }
    }

    /// 没有操作员：每次都立即报告输入已关闭
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaGate for CountingGate {
    async fn wait_for_resolution(&self, _title: &str) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Err(PublishError::OperatorUnavailable);
        }
        if let Some(token) = &self.cancel {
            token.cancel();
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

// ========== 构造辅助 ==========

/// 一行测试数据：标题、图片来源、发布状态
pub struct Row<'a> {
    pub title: &'a str,
    pub fotos: &'a str,
    pub publicado: &'a str,
}

pub fn row(title: &str) -> Row<'_> {
    Row {
        title,
        fotos: "",
        publicado: "N",
    }
}

/// 写一张测试表格（列顺序打乱并带一个额外列，验证写回不改变结构）
pub fn write_backlog(path: &Path, rows: &[Row<'_>]) {
    let mut headers: Vec<String> = vec!["Notas".to_string()];
    headers.extend(Column::REQUIRED.iter().rev().map(|c| c.header().to_string()));

    let data = rows
        .iter()
        .map(|r| {
            let mut cells = vec![format!("nota {}", r.title)];
            cells.extend(Column::REQUIRED.iter().rev().map(|c| {
                match c {
                    Column::Titulo => r.title.to_string(),
                    Column::Fotos => r.fotos.to_string(),
                    Column::Publicado => r.publicado.to_string(),
                    Column::Link | Column::Email => String::new(),
                    Column::Categoria => "Tecnología".to_string(),
                    Column::Precio => "100".to_string(),
                    Column::Moneda => "USD".to_string(),
                    Column::Provincia => "La Habana".to_string(),
                    Column::Telefono => "53123456".to_string(),
                    other => format!("{} de {}", other.header(), r.title),
                }
            }));
            cells
        })
        .collect();

    let backlog = Backlog::new(headers, data).unwrap();
    save_backlog(&backlog, path).unwrap();
}

pub fn reload(path: &Path) -> Backlog {
    load_backlog(path).unwrap()
}

pub fn published_titles(path: &Path) -> Vec<String> {
    let backlog = reload(path);
    (0..backlog.len())
        .filter(|&row_id| backlog.is_published(row_id))
        .filter_map(|row_id| backlog.record(row_id))
        .map(|r| r.titulo)
        .collect()
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    }
}

pub fn fake_driver(page: &FakePage) -> FormDriver {
    FormDriver::new(Box::new(page.clone()), FORM_URL)
        .with_field_delay(Duration::ZERO, Duration::ZERO)
        .with_settle_timeout(Duration::ZERO)
}

/// 组装一个不等待的发布器
pub fn publisher(
    store: Box<dyn BacklogStore>,
    page: &FakePage,
    images_dir: &Path,
    gate: Arc<dyn CaptchaGate>,
    batch_size: usize,
    cancel: CancellationToken,
) -> Publisher {
    let fetcher = AssetFetcher::new(images_dir)
        .unwrap()
        .with_retry_policy(fast_retry());
    let flow = PublishFlow::new(fetcher, gate);
    Publisher::new(
        store,
        fake_driver(page),
        flow,
        Pacer::new(PacingPolicy::immediate()),
        batch_size,
        cancel,
    )
    .with_progress(false)
}
