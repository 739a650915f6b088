use async_trait::async_trait;
use chromiumoxide::handler::Handler;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Browser;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{connection, headless, BrowserHandle, FormPage, Launcher};
use crate::error::DriverError;
use crate::infrastructure::js_executor::{js_string, JsExecutor};

/// 浏览器获取方式
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// 无头模式
    pub headless: bool,
    /// 浏览器可执行文件
    pub executable: Option<String>,
    /// 设置后连接该调试端口上的已有浏览器
    pub debug_port: Option<u16>,
}

/// 基于 chromiumoxide 的启动器
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    options: LaunchOptions,
}

impl ChromeLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    type Browser = ChromeBrowser;

    async fn launch(&self) -> Result<ChromeBrowser, DriverError> {
        match self.options.debug_port {
            Some(port) => connection::connect_browser(port).await,
            None => headless::launch_browser(&self.options).await,
        }
    }
}

/// 在后台处理浏览器事件；事件流结束即表示连接断开
pub(crate) fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("浏览器事件处理错误 (忽略): {}", e);
            }
        }
        info!("浏览器事件循环已结束");
    })
}

/// chromiumoxide 浏览器
pub struct ChromeBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
    /// 由本程序启动（关闭时结束进程）；连接模式下只断开连接
    owned: bool,
}

impl ChromeBrowser {
    pub(crate) fn new(browser: Browser, handler_task: JoinHandle<()>, owned: bool) -> Self {
        Self {
            browser,
            handler_task,
            owned,
        }
    }
}

impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl BrowserHandle for ChromeBrowser {
    type Page = ChromePage;

    fn is_connected(&self) -> bool {
        !self.handler_task.is_finished()
    }

    async fn new_page(&self) -> Result<ChromePage, DriverError> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(ChromePage::new(page))
    }

    async fn pages(&self) -> Result<Vec<ChromePage>, DriverError> {
        let pages = self.browser.pages().await?;
        Ok(pages.into_iter().map(ChromePage::new).collect())
    }

    async fn close_page(&self, page: ChromePage) -> Result<(), DriverError> {
        page.executor.into_page().close().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.owned {
            self.browser.close().await?;
            if let Err(e) = self.browser.wait().await {
                warn!("等待浏览器进程退出失败: {}", e);
            }
        }
        self.handler_task.abort();
        Ok(())
    }
}

/// chromiumoxide 页面
#[derive(Clone)]
pub struct ChromePage {
    executor: JsExecutor,
}

impl ChromePage {
    pub fn new(page: chromiumoxide::Page) -> Self {
        Self {
            executor: JsExecutor::new(page),
        }
    }
}

#[async_trait]
impl FormPage for ChromePage {
    fn id(&self) -> String {
        self.executor.page().target_id().as_ref().to_string()
    }

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.executor.page().goto(url).await?;
        // goto 只等待 load 事件，再确认文档已完成
        loop {
            let state: String = self.executor.eval_as("document.readyState").await?;
            if state == "complete" {
                return Ok(());
            }
            sleep(Duration::from_millis(200)).await;
        }
    }

    async fn url(&self) -> Result<String, DriverError> {
        Ok(self.executor.page().url().await?.unwrap_or_default())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let js_code = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        self.executor.eval_as(js_code).await
    }

    async fn clear_and_type(
        &self,
        selector: &str,
        index: usize,
        text: &str,
        key_delay: Duration,
    ) -> Result<(), DriverError> {
        let element = self.executor.element(selector, index).await?;
        element.scroll_into_view().await?;
        element
            .call_js_fn(
                "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }",
                false,
            )
            .await?;
        element.click().await?;
        for ch in text.chars() {
            element.type_str(ch.to_string()).await?;
            if !key_delay.is_zero() {
                sleep(key_delay).await;
            }
        }
        Ok(())
    }

    async fn click(&self, selector: &str, index: usize) -> Result<(), DriverError> {
        let element = self.executor.element(selector, index).await?;
        element.scroll_into_view().await?;
        element.click().await?;
        Ok(())
    }

    async fn is_enabled(&self, selector: &str, index: usize) -> Result<bool, DriverError> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.querySelectorAll({})[{}];
                return !!el && !el.disabled && el.getAttribute('aria-disabled') !== 'true';
            }})()
            "#,
            js_string(selector),
            index
        );
        self.executor.eval_as(js_code).await
    }

    async fn body_text(&self) -> Result<String, DriverError> {
        self.executor
            .eval_as("document.body ? document.body.innerText : ''")
            .await
    }

    async fn snapshot(&self) -> Result<Vec<u8>, DriverError> {
        let bytes = self
            .executor
            .page()
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await?;
        Ok(bytes)
    }
}
