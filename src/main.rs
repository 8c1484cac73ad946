use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use revolico_publisher::browser::{self, BrowserSession, LaunchOptions};
use revolico_publisher::cli::Args;
use revolico_publisher::config::Config;
use revolico_publisher::infrastructure::ChromePage;
use revolico_publisher::models::{open_store, validate_backlog};
use revolico_publisher::orchestrator::{Pacer, PacingPolicy, Publisher};
use revolico_publisher::services::{
    AssetFetcher, CookieJar, DriveFallback, FormDriver, StdinGate, TextSpinner,
};
use revolico_publisher::utils::{logging, sample};
use revolico_publisher::workflow::PublishFlow;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "配置错误:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // 初始化日志，guard 必须活到程序结束
    let guards = match logging::init(&config.log_dir) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("{} {:#}", "日志初始化失败:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, config, &guards.published_log).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_env();
    if let Some(path) = &args.config {
        config = config.merge_file(path)?;
    }
    let config = args.apply(config);
    config.validate()?;
    Ok(config)
}

async fn run(args: &Args, config: Config, published_log: &Path) -> Result<()> {
    if args.create_sample {
        sample::create_sample(&config.input).context("生成示例表格失败")?;
        return Ok(());
    }

    // 表格结构错误在启动浏览器之前就中止
    let store = open_store(&config.input)?;
    let backlog = store.load().context("无法加载广告表格")?;

    if args.validate {
        let report = validate_backlog(&backlog);
        info!("{}", report);
        return Ok(());
    }

    logging::log_startup(
        &config.input,
        published_log,
        config.batch_size,
        config.delay_min,
        config.delay_max,
    );

    let fetcher =
        AssetFetcher::new(&config.images_dir)?.with_fallback(DriveFallback::default());
    let flow = PublishFlow::new(fetcher, Arc::new(StdinGate::spawn()));

    let session = open_session(&config).await?;
    let mut driver = FormDriver::new(Box::new(ChromePage::from_session(session)), &config.form_url);
    if config.spin {
        driver = driver.with_spinner(TextSpinner::default());
    }
    if let Some(path) = &config.cookies_file {
        driver = driver.with_cookie_jar(CookieJar::new(path));
    }
    driver.restore_session().await;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let pacer = Pacer::new(PacingPolicy {
        delay_min: Duration::from_secs(config.delay_min),
        delay_max: Duration::from_secs(config.delay_max),
        max_per_hour: config.max_per_hour,
        ..PacingPolicy::default()
    });

    Publisher::new(
        store,
        driver,
        flow,
        pacer,
        config.batch_size,
        cancel,
    )
    .with_progress(config.show_progress)
    .run(backlog)
    .await?;

    Ok(())
}

async fn open_session(config: &Config) -> Result<BrowserSession> {
    match config.browser_debug_port {
        Some(port) => browser::connect_to_browser_and_page(port, Some("Revolico"))
            .await
            .context("连接浏览器失败"),
        None => {
            let options = LaunchOptions {
                headless: config.headless,
                executable: config.chrome_executable.clone(),
                ..LaunchOptions::default()
            };
            browser::launch_browser(&options)
                .await
                .context("启动浏览器失败")
        }
    }
}

/// 第一次中断：保存进度后退出；第二次中断：立即退出
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("⏹️ 收到中断信号，正在保存进度并退出...（再按一次立即退出）");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("⛔ 再次中断，未保存当前批次直接退出");
            std::process::exit(130);
        }
    });
}
