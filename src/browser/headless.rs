use chromiumoxide::{Browser, BrowserConfig};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use super::chrome::{spawn_handler, ChromeBrowser, LaunchOptions};
use crate::error::DriverError;

/// 启动本地浏览器
pub async fn launch_browser(options: &LaunchOptions) -> Result<ChromeBrowser, DriverError> {
    info!(
        "🚀 启动浏览器 ({})...",
        if options.headless { "无头模式" } else { "可视模式" }
    );

    let config = build_config(options).map_err(|e| {
        error!("配置浏览器失败: {}", e);
        DriverError::Launch(format!("配置浏览器失败: {}", e))
    })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        DriverError::Launch(e.to_string())
    })?;
    debug!("浏览器启动成功");

    let handler_task = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok(ChromeBrowser::new(browser, handler_task, true))
}

fn build_config(options: &LaunchOptions) -> Result<BrowserConfig, String> {
    let mut builder = BrowserConfig::builder();
    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = &options.executable {
        debug!("使用自定义浏览器: {}", path);
        builder = builder.chrome_executable(path);
    }
    builder
        .no_sandbox()
        .viewport(None)
        .args(vec![
            "--start-maximized",       // 与人工操作时的窗口布局一致
            "--disable-gpu",           // Windows 无头模式必须禁用 GPU
            "--disable-dev-shm-usage", // 防止共享内存不足
        ])
        .build()
}
