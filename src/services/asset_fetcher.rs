//! 图片下载服务 - 业务能力层
//!
//! 只负责"把一个 URL 下载成本地文件"，不关心广告和表单。
//!
//! - 主下载：reqwest 流式下载，跟随重定向，最多 3 次，指数退避加抖动
//! - 兜底：主下载全部失败后，交给能处理该 URL 的备用下载器（如 Google Drive 分享链接）
//! - 文件大小上限 10 MB，超限时删除已写入的部分文件

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH};
use reqwest::{Client, Url};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::DownloadError;

/// 单个文件大小上限
pub const MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;

/// 单次请求超时
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#).expect("文件名正则无效")
});

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 主下载最多尝试次数
    pub max_attempts: u32,
    /// 第一次重试前的基础等待
    pub base_delay: Duration,
    /// 等待上限（抖动之前）
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的等待时间：`min(base * 2^attempt, max) * [0.5, 1.5)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);
        capped.mul_f64(rand::rng().random_range(0.5..1.5))
    }
}

/// 备用下载器
///
/// 只处理一小类 URL，主下载重试用尽后才会被调用。
#[async_trait]
pub trait FallbackDownloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// 是否能处理该 URL
    fn supports(&self, url: &str) -> bool;

    async fn download(
        &self,
        client: &Client,
        url: &str,
        dest_dir: &Path,
        max_bytes: u64,
    ) -> Result<PathBuf, DownloadError>;
}

/// 图片下载服务
pub struct AssetFetcher {
    client: Client,
    dest_dir: PathBuf,
    retry: RetryPolicy,
    max_bytes: u64,
    fallback: Option<Box<dyn FallbackDownloader>>,
}

impl AssetFetcher {
    /// 创建下载服务，文件保存在 `dest_dir`
    pub fn new(dest_dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(DEFAULT_DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|source| DownloadError::Request {
                url: String::new(),
                source,
            })?;

        Ok(Self {
            client,
            dest_dir: dest_dir.into(),
            retry: RetryPolicy::default(),
            max_bytes: MAX_ASSET_BYTES,
            fallback: None,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_fallback(mut self, fallback: impl FallbackDownloader + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// 下载文件并返回本地路径
    pub async fn fetch(&self, url: &str) -> Result<PathBuf, DownloadError> {
        let url = url.trim();
        validate_url(url)?;

        tokio::fs::create_dir_all(&self.dest_dir)
            .await
            .map_err(|source| DownloadError::Io {
                path: self.dest_dir.clone(),
                source,
            })?;

        let mut last_error = None;
        for attempt in 0..self.retry.max_attempts {
            match stream_to_file(&self.client, url, &self.dest_dir, self.max_bytes, None).await {
                Ok(path) => return finish_download(path).await,
                Err(e) => {
                    warn!(
                        "⚠️ 图片下载失败 (第 {}/{} 次): {}",
                        attempt + 1,
                        self.retry.max_attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt + 1 < self.retry.max_attempts {
                        sleep(self.retry.backoff(attempt)).await;
                    }
                }
            }
        }

        if let Some(fallback) = self.fallback.as_ref().filter(|f| f.supports(url)) {
            info!("🔁 主下载失败，尝试备用下载器: {}", fallback.name());
            match fallback
                .download(&self.client, url, &self.dest_dir, self.max_bytes)
                .await
            {
                Ok(path) => return finish_download(path).await,
                Err(e) => {
                    warn!("⚠️ 备用下载器失败: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DownloadError::InvalidUrl(url.to_string())))
    }

    /// 删除缓存目录中的所有文件，返回删除数量
    pub fn clear_cache(&self) -> std::io::Result<usize> {
        clear_directory(&self.dest_dir)
    }
}

/// 删除目录下的所有普通文件（不递归），目录不存在视为已清空
pub fn clear_directory(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn validate_url(url: &str) -> Result<(), DownloadError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(DownloadError::InvalidUrl(url.to_string())),
    }
}

/// 流式下载到目录，超过 `max_bytes` 时删除部分文件并返回 `TooLarge`
///
/// `default_name` 在响应头没有文件名时优先于 URL 末段使用。
pub(crate) async fn stream_to_file(
    client: &Client,
    url: &str,
    dest_dir: &Path,
    max_bytes: u64,
    default_name: Option<&str>,
) -> Result<PathBuf, DownloadError> {
    let request_err = |source| DownloadError::Request {
        url: url.to_string(),
        source,
    };

    let mut response = client.get(url).send().await.map_err(request_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::BadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let declared = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(size) = declared.filter(|&size| size > max_bytes) {
        return Err(DownloadError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let content_disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = derive_filename(url, content_disposition.as_deref(), default_name);
    let path = dest_dir.join(filename);

    let io_err = |source| DownloadError::Io {
        path: path.clone(),
        source,
    };

    let mut file = tokio::fs::File::create(&path).await.map_err(io_err)?;
    let mut written: u64 = 0;

    let outcome = async {
        while let Some(chunk) = response.chunk().await.map_err(request_err)? {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(DownloadError::TooLarge {
                    size: written,
                    limit: max_bytes,
                });
            }
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)
    }
    .await;

    if let Err(e) = outcome {
        drop(file);
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }

    debug!("已下载 {} 字节: {}", written, path.display());
    Ok(path)
}

/// 下载成功后的校验：计算 SHA-256 并记录日志
async fn finish_download(path: PathBuf) -> Result<PathBuf, DownloadError> {
    let checksum = sha256_file(&path).await?;
    info!(
        "🖼️ 图片已下载: {}",
        path.file_name().unwrap_or_default().to_string_lossy()
    );
    debug!("sha256 {}", checksum);
    Ok(path)
}

pub async fn sha256_file(path: &Path) -> Result<String, DownloadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// 文件名：Content-Disposition → `default_name` → URL 末段 → 时间戳
pub fn derive_filename(
    url: &str,
    content_disposition: Option<&str>,
    default_name: Option<&str>,
) -> String {
    content_disposition
        .and_then(|cd| FILENAME_RE.captures(cd))
        .and_then(|caps| sanitize_filename(caps.get(1)?.as_str()))
        .or_else(|| default_name.and_then(sanitize_filename))
        .or_else(|| url_tail(url).and_then(|tail| sanitize_filename(&tail)))
        .unwrap_or_else(|| format!("download_{}.bin", chrono::Utc::now().timestamp()))
}

fn url_tail(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// 只保留最后一段路径，去掉引号和空白
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
