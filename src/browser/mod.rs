//! 浏览器驱动层
//!
//! 用三个 trait 描述流程所需的全部浏览器能力：
//! - `Launcher`：启动（或连接）浏览器
//! - `BrowserHandle`：一个浏览器进程及其页面
//! - `FormPage`：单个页面上的元素查询与交互
//!
//! 各阶段只依赖 `FormPage`，生产环境使用 chromiumoxide 实现，测试使用 `fake` 模块。

pub mod chrome;
pub mod connection;
pub mod headless;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::DriverError;

pub use chrome::{ChromeBrowser, ChromeLauncher, ChromePage, LaunchOptions};

/// 页面能力
///
/// 元素一律以 `(选择器, 位置)` 定位，每次操作时重新查询，不跨页面保留元素引用
#[async_trait]
pub trait FormPage: Clone + Send + Sync + 'static {
    /// 页面唯一标识；页面被替换后标识随之改变
    fn id(&self) -> String;

    /// 导航到指定地址并等待文档加载完成
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// 当前地址
    async fn url(&self) -> Result<String, DriverError>;

    /// 匹配选择器的元素数量
    async fn count(&self, selector: &str) -> Result<usize, DriverError>;

    /// 清空输入框后逐字输入
    async fn clear_and_type(
        &self,
        selector: &str,
        index: usize,
        text: &str,
        key_delay: Duration,
    ) -> Result<(), DriverError>;

    /// 滚动到元素并点击
    async fn click(&self, selector: &str, index: usize) -> Result<(), DriverError>;

    /// 元素存在且可用
    async fn is_enabled(&self, selector: &str, index: usize) -> Result<bool, DriverError>;

    /// 页面可见文本
    async fn body_text(&self) -> Result<String, DriverError>;

    /// 页面快照（PNG）
    async fn snapshot(&self) -> Result<Vec<u8>, DriverError>;
}

/// 浏览器进程句柄
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    type Page: FormPage;

    /// 连接是否仍然存活
    fn is_connected(&self) -> bool;

    async fn new_page(&self) -> Result<Self::Page, DriverError>;

    /// 当前打开的全部页面
    async fn pages(&self) -> Result<Vec<Self::Page>, DriverError>;

    async fn close_page(&self, page: Self::Page) -> Result<(), DriverError>;

    /// 关闭浏览器
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// 浏览器启动器
#[async_trait]
pub trait Launcher: Send + Sync {
    type Browser: BrowserHandle;

    async fn launch(&self) -> Result<Self::Browser, DriverError>;
}
