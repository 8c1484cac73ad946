use revolico_publisher::browser::{connect_to_browser_and_page, launch_browser, LaunchOptions};
use revolico_publisher::config::Config;
use revolico_publisher::infrastructure::{ChromePage, PageDriver};
use revolico_publisher::models::{open_store, validate_backlog};
use std::time::Duration;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_launch_headless_and_open_form() {
    let config = Config::from_env();

    let session = launch_browser(&LaunchOptions {
        headless: true,
        executable: config.chrome_executable.clone(),
        ..LaunchOptions::default()
    })
    .await
    .expect("启动浏览器失败");
    let mut page = ChromePage::from_session(session);

    page.navigate(&config.form_url).await.expect("打开发布页失败");
    page.wait_for_idle(Duration::from_secs(15))
        .await
        .expect("页面未加载完成");

    let url = page.current_url().await.unwrap();
    println!("当前页面: {}", url);
    assert!(url.starts_with("http"));

    page.close().await.unwrap();
    // 重复关闭不报错
    page.close().await.unwrap();
}

#[tokio::test]
#[ignore] // 需要一个以 --remote-debugging-port 启动的浏览器
async fn test_attach_mode_closes_only_its_own_tab() {
    let config = Config::from_env();
    let port = config.browser_debug_port.unwrap_or(9222);

    // 标题不会匹配任何页面，因此新建一个标签页
    let session = connect_to_browser_and_page(port, Some("__sin_coincidencia__"))
        .await
        .expect("连接浏览器失败");
    assert!(!session.owned);
    assert!(session.page_owned);
    let target = session.page.target_id().clone();
    let observer = connect_to_browser_and_page(port, None)
        .await
        .expect("连接浏览器失败");

    let mut page = ChromePage::from_session(session);
    page.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let remaining = observer.browser.pages().await.unwrap();
    assert!(remaining.iter().all(|p| p.target_id() != &target));
    assert!(!remaining.is_empty(), "浏览器本身应保持运行");
    observer.page.close().await.ok();
}

#[tokio::test]
#[ignore]
async fn test_browser_connection() {
    let config = Config::from_env();
    let port = config.browser_debug_port.unwrap_or(9222);

    // 测试浏览器连接
    let result = connect_to_browser_and_page(port, Some("Revolico")).await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_load_local_backlog() {
    let config = Config::from_env();

    // 测试加载默认的广告表格
    let backlog = open_store(&config.input)
        .expect("不支持的表格格式")
        .load()
        .expect("应该能够加载广告表格");

    let report = validate_backlog(&backlog);
    println!("{}", report);
}
