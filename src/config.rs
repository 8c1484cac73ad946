use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::services::form_driver::DEFAULT_FORM_URL;

/// 程序配置
///
/// 优先级：默认值 → 环境变量 → TOML 配置文件 → 命令行参数
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// 广告表格路径
    pub input: PathBuf,
    /// 每批广告数量
    pub batch_size: usize,
    /// 是否无头模式
    pub headless: bool,
    /// 每条广告之间的最短间隔（秒）
    pub delay_min: u64,
    /// 每条广告之间的最长间隔（秒）
    pub delay_max: u64,
    /// 每小时最多发布数量
    pub max_per_hour: Option<usize>,
    /// 是否对描述做同义词替换
    pub spin: bool,
    // --- 环境 ---
    pub images_dir: PathBuf,
    pub form_url: String,
    pub log_dir: PathBuf,
    /// 设置后连接已有浏览器而不是启动新浏览器
    pub browser_debug_port: Option<u16>,
    pub chrome_executable: Option<PathBuf>,
    /// 设置后在运行之间保存并恢复登录 cookie
    pub cookies_file: Option<PathBuf>,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("anuncios.xlsx"),
            batch_size: 100,
            headless: false,
            delay_min: 3,
            delay_max: 7,
            max_per_hour: None,
            spin: false,
            images_dir: PathBuf::from("data/imagenes"),
            form_url: DEFAULT_FORM_URL.to_string(),
            log_dir: PathBuf::from("logs"),
            browser_debug_port: None,
            chrome_executable: None,
            cookies_file: None,
            show_progress: true,
        }
    }
}

/// TOML 配置文件，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    input: Option<PathBuf>,
    batch_size: Option<usize>,
    headless: Option<bool>,
    delay_min: Option<u64>,
    delay_max: Option<u64>,
    max_per_hour: Option<usize>,
    spin: Option<bool>,
    images_dir: Option<PathBuf>,
    form_url: Option<String>,
    log_dir: Option<PathBuf>,
    browser_debug_port: Option<u16>,
    chrome_executable: Option<PathBuf>,
    cookies_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        Self {
            images_dir: non_empty("IMAGES_DIR").map(PathBuf::from).unwrap_or(default.images_dir),
            form_url: non_empty("REVOLICO_FORM_URL").unwrap_or(default.form_url),
            log_dir: non_empty("LOG_DIR").map(PathBuf::from).unwrap_or(default.log_dir),
            browser_debug_port: non_empty("BROWSER_DEBUG_PORT").and_then(|v| v.trim().parse().ok()),
            chrome_executable: non_empty("CHROME_EXECUTABLE").map(PathBuf::from),
            cookies_file: non_empty("COOKIES_FILE").map(PathBuf::from),
            ..default
        }
    }

    /// 用 TOML 文件覆盖当前配置
    pub fn merge_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |reason: String| ConfigError::FileLoadFailed {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| load_failed(e.to_string()))?;
        let file: FileConfig = toml::from_str(&raw).map_err(|e| load_failed(e.to_string()))?;

        if let Some(v) = file.input {
            self.input = v;
        }
        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = file.headless {
            self.headless = v;
        }
        if let Some(v) = file.delay_min {
            self.delay_min = v;
        }
        if let Some(v) = file.delay_max {
            self.delay_max = v;
        }
        if file.max_per_hour.is_some() {
            self.max_per_hour = file.max_per_hour;
        }
        if let Some(v) = file.spin {
            self.spin = v;
        }
        if let Some(v) = file.images_dir {
            self.images_dir = v;
        }
        if let Some(v) = file.form_url {
            self.form_url = v;
        }
        if let Some(v) = file.log_dir {
            self.log_dir = v;
        }
        if file.browser_debug_port.is_some() {
            self.browser_debug_port = file.browser_debug_port;
        }
        if file.chrome_executable.is_some() {
            self.chrome_executable = file.chrome_executable;
        }
        if file.cookies_file.is_some() {
            self.cookies_file = file.cookies_file;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.delay_min > self.delay_max {
            return Err(ConfigError::InvalidDelayWindow {
                min: self.delay_min,
                max: self.delay_max,
            });
        }
        Ok(())
    }
}
