//! 命令行参数

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug, Default)]
#[command(name = "revolico_publisher", version, about = "Revolico 广告批量发布")]
pub struct Args {
    /// 每批广告数量
    #[arg(long = "lote", visible_alias = "batch-size", value_name = "N")]
    pub lote: Option<usize>,

    /// 无头模式 (true/false/1/0/yes/no)，不带值等同 true
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub headless: Option<bool>,

    /// 每条广告之间的最短间隔（秒）
    #[arg(long, value_name = "SECS")]
    pub delay_min: Option<u64>,

    /// 每条广告之间的最长间隔（秒）
    #[arg(long, value_name = "SECS")]
    pub delay_max: Option<u64>,

    /// 广告表格路径（.xlsx 或 .csv）
    #[arg(long = "excel", visible_alias = "input", value_name = "PATH")]
    pub excel: Option<PathBuf>,

    /// TOML 配置文件
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 在运行之间保存并恢复登录 cookie 的 JSON 文件
    #[arg(long, value_name = "PATH")]
    pub cookies: Option<PathBuf>,

    /// 每小时最多发布数量
    #[arg(long, value_name = "N")]
    pub max_per_hour: Option<usize>,

    /// 对描述做同义词替换
    #[arg(long)]
    pub spin: bool,

    /// 生成示例表格后退出
    #[arg(long)]
    pub create_sample: bool,

    /// 只检查表格内容，不发布
    #[arg(long, conflicts_with = "create_sample")]
    pub validate: bool,

    /// 不显示进度条
    #[arg(long)]
    pub no_progress: bool,
}

impl Args {
    /// 命令行参数覆盖配置
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(v) = self.lote {
            config.batch_size = v;
        }
        if let Some(v) = self.headless {
            config.headless = v;
        }
        if let Some(v) = self.delay_min {
            config.delay_min = v;
        }
        if let Some(v) = self.delay_max {
            config.delay_max = v;
        }
        if let Some(v) = &self.excel {
            config.input = v.clone();
        }
        if self.max_per_hour.is_some() {
            config.max_per_hour = self.max_per_hour;
        }
        if let Some(v) = &self.cookies {
            config.cookies_file = Some(v.clone());
        }
        if self.spin {
            config.spin = true;
        }
        if self.no_progress {
            config.show_progress = false;
        }
        config
    }
}

/// 解析布尔参数
pub fn parse_bool_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "si" | "sí" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        other => Err(format!("无法解析布尔值: {}", other)),
    }
}
