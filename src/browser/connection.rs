use chromiumoxide::Browser;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use super::chrome::{spawn_handler, ChromeBrowser};
use crate::error::DriverError;

/// 连接到调试端口上已运行的浏览器
///
/// 连接模式下浏览器由用户管理，关闭会话时只断开连接
pub async fn connect_browser(port: u16) -> Result<ChromeBrowser, DriverError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        DriverError::Launch(format!("无法连接到浏览器 (端口: {}): {}", port, e))
    })?;
    debug!("浏览器连接成功");

    let handler_task = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok(ChromeBrowser::new(browser, handler_task, false))
}
