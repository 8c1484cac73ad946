//! 批次进度条

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// 创建批次进度条；`visible` 为假时返回隐藏的进度条
pub fn create_batch_progress(total: u64, batch_number: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(format!("批次 {}", batch_number));
    pb.enable_steady_tick(Duration::from_millis(200));
    pb
}

/// 把秒数格式化为 "1h 02m 03s"
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
