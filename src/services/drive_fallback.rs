//! Google Drive 备用下载器
//!
//! 分享链接（`/file/d/<id>/view`、`open?id=<id>`、`uc?id=<id>`）返回的是预览页，
//! 这里把它改写为直接下载地址后再走普通的限额下载。

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use crate::error::DownloadError;
use crate::services::asset_fetcher::{stream_to_file, FallbackDownloader};

const DRIVE_BASE_URL: &str = "https://drive.google.com";

static DRIVE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:/file/d/|[?&]id=)([A-Za-z0-9_-]{3,})").expect("Drive ID 正则无效")
});

/// Google Drive 备用下载器
#[derive(Debug, Clone)]
pub struct DriveFallback {
    base_url: String,
}

impl Default for DriveFallback {
    fn default() -> Self {
        Self {
            base_url: DRIVE_BASE_URL.to_string(),
        }
    }
}

impl DriveFallback {
    /// 使用自定义下载地址（测试或镜像）
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn is_drive_host(&self, url: &str) -> bool {
        url.starts_with(&self.base_url)
            || url.contains("drive.google.com")
            || url.contains("docs.google.com")
    }

    /// 直接下载地址
    pub fn direct_url(&self, file_id: &str) -> String {
        format!("{}/uc?export=download&id={}", self.base_url, file_id)
    }
}

/// 从分享链接中提取文件 ID
pub fn drive_file_id(url: &str) -> Option<String> {
    DRIVE_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl FallbackDownloader for DriveFallback {
    fn name(&self) -> &'static str {
        "google-drive"
    }

    fn supports(&self, url: &str) -> bool {
        self.is_drive_host(url) && drive_file_id(url).is_some()
    }

    async fn download(
        &self,
        client: &Client,
        url: &str,
        dest_dir: &Path,
        max_bytes: u64,
    ) -> Result<PathBuf, DownloadError> {
        let file_id =
            drive_file_id(url).ok_or_else(|| DownloadError::InvalidUrl(url.to_string()))?;
        let direct = self.direct_url(&file_id);
        debug!("Drive 直接下载地址: {}", direct);

        let default_name = format!("drive_{}.bin", file_id);
        stream_to_file(client, &direct, dest_dir, max_bytes, Some(&default_name)).await
    }
}
