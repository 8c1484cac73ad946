//! 登录状态持久化
//!
//! 把浏览器 cookie 存成 JSON 文件，下次运行先写回浏览器，省去重新登录。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::infrastructure::SessionCookie;
use crate::models::loaders::replace_file;

/// JSON cookie 文件
#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取 cookie，文件不存在时返回空列表
    pub fn load(&self) -> Result<Vec<SessionCookie>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| StoreError::CookieFile {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, cookies: &[SessionCookie]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(cookies).map_err(|source| StoreError::CookieFile {
            path: self.path.clone(),
            source,
        })?;
        replace_file(&self.path, &json)
    }
}
