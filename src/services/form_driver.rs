//! 表单自动化驱动 - 业务能力层
//!
//! 独占唯一的浏览器会话，只负责"把一条广告填进发布表单并提交"。
//!
//! 状态机：`Idle → Navigated → Filled → Submitted → {Success, ValidationFailed, CaptchaPaused}`
//!
//! 每条广告都从 `Idle` 开始，但页面和 cookie 在整个运行期间保持不变。
//! 配置了 cookie 文件时，开始前写回上次的 cookie，关闭前再存一次。

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::PublishError;
use crate::infrastructure::{ElementHandle, PageDriver};
use crate::models::ad::{AdPayload, Column};
use crate::services::cookie_jar::CookieJar;
use crate::services::text_spinner::TextSpinner;

/// 发布页面默认地址
pub const DEFAULT_FORM_URL: &str = "https://www.revolico.com/publicar";

/// 提交后等待网络空闲的超时
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// 网络空闲后继续等待成功/错误提示出现的时长
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 表单字段：逻辑列 → CSS 选择器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormField {
    pub column: Column,
    pub selector: &'static str,
}

/// 按固定顺序填写：图片最先，方便确认预览上传成功
pub const FORM_FIELDS: [FormField; 11] = [
    FormField {
        column: Column::Fotos,
        selector: "input[type='file'][name='image'], input[type='file'][data-testid='image-input']",
    },
    FormField {
        column: Column::Categoria,
        selector: "select[name='category'], [data-testid='category-select']",
    },
    FormField {
        column: Column::Subcategoria,
        selector: "select[name='subcategory'], [data-testid='subcategory-select']",
    },
    FormField {
        column: Column::Titulo,
        selector: "input[name='title'], [data-testid='title-input']",
    },
    FormField {
        column: Column::Descripcion,
        selector: "textarea[name='description'], [data-testid='description-textarea']",
    },
    FormField {
        column: Column::Precio,
        selector: "input[name='price'], [data-testid='price-input']",
    },
    FormField {
        column: Column::Moneda,
        selector: "select[name='currency'], [data-testid='currency-select']",
    },
    FormField {
        column: Column::Provincia,
        selector: "select[name='province'], [data-testid='province-select']",
    },
    FormField {
        column: Column::Municipio,
        selector: "select[name='municipality'], [data-testid='municipality-select']",
    },
    FormField {
        column: Column::Telefono,
        selector: "input[name='phone'], [data-testid='phone-input']",
    },
    FormField {
        column: Column::Email,
        selector: "input[name='email'], [data-testid='email-input']",
    },
];

pub const SUBMIT_SELECTOR: &str = "button[type='submit'], [data-testid='submit-button']";

pub const CAPTCHA_SELECTORS: [&str; 4] = [
    "iframe[src*='recaptcha']",
    "div.g-recaptcha",
    "div[id*='recaptcha']",
    "div[class*='captcha']",
];

pub const SUCCESS_SELECTOR: &str = "[data-testid='publish-success']";
pub const ERROR_SELECTOR: &str = ".error, [data-testid='publish-error']";

static SUCCESS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(publicado|éxito|success|gracias)").expect("成功提示正则无效")
});
static ERROR_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(error|falló)").expect("错误提示正则无效"));

/// 单条广告的表单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Navigated,
    Filled,
    Submitted,
    Success,
    ValidationFailed,
    CaptchaPaused,
}

impl fmt::Display for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormState::Idle => "空闲",
            FormState::Navigated => "已打开",
            FormState::Filled => "已填写",
            FormState::Submitted => "已提交",
            FormState::Success => "成功",
            FormState::ValidationFailed => "校验失败",
            FormState::CaptchaPaused => "验证码暂停",
        };
        f.write_str(name)
    }
}

/// 一次发布的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 发布成功，`url` 为提交后页面地址
    Published { url: String },
    /// 表单报告校验错误
    ValidationFailed,
    /// 出现验证码，需要人工处理后重试同一条广告
    CaptchaPaused,
}

/// 提交后页面上的提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndicators {
    pub success: bool,
    pub error: bool,
}

impl PageIndicators {
    /// 有错误提示即失败；两种提示都没有时按成功处理
    pub fn classify(self) -> FormState {
        if self.error {
            FormState::ValidationFailed
        } else {
            FormState::Success
        }
    }

    pub fn is_ambiguous(self) -> bool {
        !self.success && !self.error
    }
}

/// 提交后页面稳定下来的样子
enum Settled {
    Captcha,
    Indicators(PageIndicators),
}

enum FieldValue<'a> {
    File(&'a Path),
    Text(&'a str),
}

/// 表单自动化驱动
pub struct FormDriver {
    page: Box<dyn PageDriver>,
    form_url: String,
    field_delay: (Duration, Duration),
    idle_timeout: Duration,
    settle_timeout: Duration,
    spinner: Option<TextSpinner>,
    cookie_jar: Option<CookieJar>,
    state: FormState,
}

impl FormDriver {
    pub fn new(page: Box<dyn PageDriver>, form_url: impl Into<String>) -> Self {
        Self {
            page,
            form_url: form_url.into(),
            field_delay: (Duration::from_millis(500), Duration::from_millis(1500)),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            spinner: None,
            cookie_jar: None,
            state: FormState::Idle,
        }
    }

    /// 每个字段之后的随机停顿区间
    pub fn with_field_delay(mut self, min: Duration, max: Duration) -> Self {
        self.field_delay = (min, max.max(min));
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// 提交后最多等多久让提示出现；为零时只检查一次
    pub fn with_settle_timeout(mut self, settle_timeout: Duration) -> Self {
        self.settle_timeout = settle_timeout;
        self
    }

    /// 填写前对描述做同义词替换
    pub fn with_spinner(mut self, spinner: TextSpinner) -> Self {
        self.spinner = Some(spinner);
        self
    }

    /// 跨运行保存登录 cookie
    pub fn with_cookie_jar(mut self, jar: CookieJar) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// 把上次保存的 cookie 写回浏览器，失败只记警告
    pub async fn restore_session(&mut self) {
        let Some(jar) = &self.cookie_jar else {
            return;
        };
        let cookies = match jar.load() {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("⚠️ 读取 cookie 失败: {}", e);
                return;
            }
        };
        if cookies.is_empty() {
            debug!("没有可恢复的 cookie: {}", jar.path().display());
            return;
        }
        match self.page.set_cookies(&cookies).await {
            Ok(()) => info!("🍪 已恢复 {} 个 cookie", cookies.len()),
            Err(e) => warn!("⚠️ 写入 cookie 失败: {}", e),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    /// 发布一条广告
    ///
    /// 找不到提交按钮时返回 `PublishError::SubmitControlMissing`，
    /// 验证码不是错误，而是 `PublishOutcome::CaptchaPaused`。
    pub async fn publish(&mut self, ad: &AdPayload) -> Result<PublishOutcome, PublishError> {
        self.transition(FormState::Idle);

        self.page.navigate(&self.form_url).await?;
        if self.captcha_present().await {
            self.transition(FormState::CaptchaPaused);
            return Ok(PublishOutcome::CaptchaPaused);
        }
        self.transition(FormState::Navigated);

        self.fill_fields(ad).await?;
        self.transition(FormState::Filled);

        let submit = self
            .page
            .query(SUBMIT_SELECTOR)
            .await?
            .ok_or(PublishError::SubmitControlMissing)?;
        self.page.click(&submit).await?;
        self.transition(FormState::Submitted);

        match self.page.wait_for_idle(self.idle_timeout).await {
            Ok(()) => {}
            Err(PublishError::Timeout(waited)) => {
                warn!("⚠️ 提交后 {:?} 内网络未空闲，继续检查页面提示", waited);
            }
            Err(e) => return Err(e),
        }

        let indicators = match self.await_result().await? {
            Settled::Captcha => {
                self.transition(FormState::CaptchaPaused);
                return Ok(PublishOutcome::CaptchaPaused);
            }
            Settled::Indicators(indicators) => indicators,
        };
        if indicators.is_ambiguous() {
            warn!("⚠️ 提交后页面既无成功也无错误提示，按成功处理: {}", ad.titulo);
        }

        match indicators.classify() {
            FormState::ValidationFailed => {
                self.transition(FormState::ValidationFailed);
                Ok(PublishOutcome::ValidationFailed)
            }
            _ => {
                self.transition(FormState::Success);
                let url = self.page.current_url().await?;
                Ok(PublishOutcome::Published { url })
            }
        }
    }

    /// 保存 cookie 后释放浏览器会话
    pub async fn close(&mut self) -> Result<(), PublishError> {
        if let Some(jar) = self.cookie_jar.take() {
            self.save_session(&jar).await;
        }
        self.page.close().await
    }

    async fn save_session(&mut self, jar: &CookieJar) {
        let cookies = match self.page.cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("⚠️ 读取浏览器 cookie 失败: {}", e);
                return;
            }
        };
        // 页面异常时拿到的列表可能是空的，不覆盖已有文件
        if cookies.is_empty() {
            return;
        }
        match jar.save(&cookies) {
            Ok(()) => info!("🍪 已保存 {} 个 cookie: {}", cookies.len(), jar.path().display()),
            Err(e) => warn!("⚠️ 保存 cookie 失败: {}", e),
        }
    }

    async fn fill_fields(&mut self, ad: &AdPayload) -> Result<(), PublishError> {
        let description = match &self.spinner {
            Some(spinner) => spinner.spin(&ad.descripcion),
            None => ad.descripcion.clone(),
        };

        for field in FORM_FIELDS.iter() {
            let value = match field.column {
                Column::Fotos => ad.photo.as_deref().map(FieldValue::File),
                Column::Descripcion if !description.is_empty() => {
                    Some(FieldValue::Text(description.as_str()))
                }
                column => ad.text(column).map(FieldValue::Text),
            };
            let Some(value) = value else {
                continue;
            };

            let Some(element) = self.page.query(field.selector).await? else {
                debug!("字段 {} 不在页面上，跳过", field.column.header());
                continue;
            };

            self.fill_one(&element, value).await?;
            self.human_pause().await;
        }
        Ok(())
    }

    async fn fill_one(
        &mut self,
        element: &ElementHandle,
        value: FieldValue<'_>,
    ) -> Result<(), PublishError> {
        match value {
            FieldValue::File(path) if element.is_file_input() => {
                self.page.set_file(element, path).await
            }
            FieldValue::File(_) => {
                warn!("⚠️ 图片字段不是文件输入框，跳过: {}", element.selector);
                Ok(())
            }
            FieldValue::Text(text) if element.is_select() => {
                self.page.select_option(element, text).await
            }
            FieldValue::Text(text) => self.page.fill(element, text).await,
        }
    }

    async fn captcha_present(&mut self) -> bool {
        for selector in CAPTCHA_SELECTORS {
            match self.page.query(selector).await {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                Err(e) => debug!("验证码检测出错 ({}): {}", selector, e),
            }
        }
        false
    }

    /// 轮询直到出现验证码、成功或错误提示，或等待超时
    async fn await_result(&mut self) -> Result<Settled, PublishError> {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            if self.captcha_present().await {
                return Ok(Settled::Captcha);
            }
            let indicators = self.read_indicators().await?;
            let now = Instant::now();
            if !indicators.is_ambiguous() || now >= deadline {
                return Ok(Settled::Indicators(indicators));
            }
            sleep(SETTLE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn read_indicators(&mut self) -> Result<PageIndicators, PublishError> {
        let text = self.page.body_text().await?;
        let success = self.page.query(SUCCESS_SELECTOR).await?.is_some()
            || SUCCESS_TEXT.is_match(&text);
        let error =
            self.page.query(ERROR_SELECTOR).await?.is_some() || ERROR_TEXT.is_match(&text);
        Ok(PageIndicators { success, error })
    }

    async fn human_pause(&self) {
        let (min, max) = self.field_delay;
        if max.is_zero() {
            return;
        }
        let delay = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        sleep(delay).await;
    }

    fn transition(&mut self, next: FormState) {
        debug!("表单状态: {} → {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_field_is_first() {
        assert_eq!(FORM_FIELDS[0].column, Column::Fotos);
        assert!(FORM_FIELDS[1..].iter().all(|f| f.column != Column::Fotos));
    }

    #[test]
    fn test_classification() {
        let both = PageIndicators {
            success: true,
            error: true,
        };
        let ok = PageIndicators {
            success: true,
            error: false,
        };
        let neither = PageIndicators {
            success: false,
            error: false,
        };
        assert_eq!(both.classify(), FormState::ValidationFailed);
        assert_eq!(ok.classify(), FormState::Success);
        assert_eq!(neither.classify(), FormState::Success);
        assert!(neither.is_ambiguous());
    }

    #[test]
    fn test_indicator_texts() {
        assert!(SUCCESS_TEXT.is_match("¡Gracias! Su anuncio fue Publicado"));
        assert!(SUCCESS_TEXT.is_match("Éxito"));
        assert!(ERROR_TEXT.is_match("El envío falló"));
        assert!(ERROR_TEXT.is_match("Error: precio inválido"));
        assert!(!ERROR_TEXT.is_match("Anuncios recientes"));
    }
}
