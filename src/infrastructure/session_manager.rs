//! 会话管理器 - 基础设施层
//!
//! 唯一持有浏览器进程与活动页面的模块。其他组件只在单次操作期间借用页面。
//!
//! 不变量：
//! - 任意时刻最多一个活动页面，其余页面在下次取用活动页面时被关闭
//! - 会话操作失败后标记为损坏，下一次 `ensure_live_session` 时整体重启

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{BrowserHandle, FormPage, Launcher};
use crate::error::{DriverError, StageError, StageResult};
use crate::models::RetryBudget;

/// 启动器产生的页面类型
pub type PageOf<L> = <<L as Launcher>::Browser as BrowserHandle>::Page;

/// 浏览器启动策略
#[derive(Debug, Clone, Copy)]
pub struct LaunchPolicy {
    /// 单次建立会话时的最大启动次数
    pub attempts: u32,
    /// 启动失败后的等待
    pub retry_delay: Duration,
    /// 新页面打开后的等待
    pub page_settle: Duration,
}

/// 会话管理器
pub struct SessionManager<L: Launcher> {
    launcher: L,
    policy: LaunchPolicy,
    browser: Option<L::Browser>,
    active: Option<PageOf<L>>,
    /// 上一次会话操作失败，需要重启
    broken: bool,
    launches: u32,
}

impl<L: Launcher> SessionManager<L> {
    pub fn new(launcher: L, policy: LaunchPolicy) -> Self {
        Self {
            launcher,
            policy,
            browser: None,
            active: None,
            broken: false,
            launches: 0,
        }
    }

    /// 会话是否存活
    pub fn is_live(&self) -> bool {
        !self.broken && self.browser.as_ref().is_some_and(|b| b.is_connected())
    }

    /// 累计成功启动次数
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// 确保存在存活的会话；会话缺失、断开或损坏时重新启动
    pub async fn ensure_live_session(&mut self) -> StageResult<&L::Browser> {
        if !self.is_live() {
            if self.browser.is_some() {
                warn!("⚠️ 浏览器会话已断开，正在重新启动...");
                self.teardown().await;
            }
            self.launch().await?;
        }
        self.browser
            .as_ref()
            .ok_or_else(|| StageError::SessionDisconnected {
                reason: "会话不存在".to_string(),
            })
    }

    async fn launch(&mut self) -> StageResult<()> {
        let mut budget = RetryBudget::new(self.policy.attempts);
        let mut last_error = String::from("启动次数为 0");

        while budget.try_consume() {
            match self.launcher.launch().await {
                Ok(browser) => {
                    self.launches += 1;
                    info!("✓ 浏览器会话已建立 (第 {} 次启动)", self.launches);
                    self.browser = Some(browser);
                    self.active = None;
                    self.broken = false;
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "浏览器启动失败 (尝试 {}/{}): {}",
                        budget.used(),
                        budget.max(),
                        e
                    );
                    last_error = e.to_string();
                    if !budget.is_exhausted() {
                        sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        Err(StageError::SessionLaunchFailed {
            attempts: budget.used(),
            reason: last_error,
        })
    }

    /// 返回唯一的活动页面，并关闭其他所有页面
    pub async fn active_page(&mut self) -> StageResult<PageOf<L>> {
        self.ensure_live_session().await?;
        let result = self.settle_active_page().await;
        self.mark_on_error(result)
    }

    async fn settle_active_page(&mut self) -> Result<PageOf<L>, DriverError> {
        let browser = self.browser.as_ref().ok_or(DriverError::Disconnected)?;
        let pages = browser.pages().await?;

        let active_id = self.active.as_ref().map(|p| p.id());
        let active_open = active_id
            .as_ref()
            .is_some_and(|id| pages.iter().any(|p| p.id() == *id));

        // 先打开新页面再关闭其他页面，避免窗口在中途全部关闭
        let active = if active_open {
            self.active.clone().ok_or(DriverError::Disconnected)?
        } else {
            let page = browser.new_page().await?;
            debug!("已打开新的活动页面: {}", page.id());
            page
        };

        let mut closed = 0;
        for page in pages {
            if page.id() != active.id() {
                if let Err(e) = browser.close_page(page).await {
                    debug!("关闭多余页面失败 (忽略): {}", e);
                }
                closed += 1;
            }
        }
        if closed > 0 {
            debug!("已关闭 {} 个多余页面", closed);
        }

        if !active_open {
            sleep(self.policy.page_settle).await;
            self.active = Some(active.clone());
        }
        Ok(active)
    }

    /// 关闭当前活动页面并打开新页面，避免客户端状态带入下一条记录
    pub async fn recycle_active_page(&mut self) -> StageResult<PageOf<L>> {
        let result = self.replace_active_page().await;
        self.mark_on_error(result)
    }

    async fn replace_active_page(&mut self) -> Result<PageOf<L>, DriverError> {
        let browser = self
            .browser
            .as_ref()
            .filter(|b| b.is_connected())
            .ok_or(DriverError::Disconnected)?;

        let fresh = browser.new_page().await?;
        if let Some(old) = self.active.take() {
            if let Err(e) = browser.close_page(old).await {
                debug!("关闭旧页面失败 (忽略): {}", e);
            }
        }
        sleep(self.policy.page_settle).await;
        self.active = Some(fresh.clone());
        Ok(fresh)
    }

    /// 当前活动页面（不会触发重启）
    pub fn current_page(&self) -> Option<PageOf<L>> {
        if self.is_live() {
            self.active.clone()
        } else {
            None
        }
    }

    /// 关闭浏览器；所有退出路径都应调用
    pub async fn teardown(&mut self) {
        self.active = None;
        self.broken = false;
        if let Some(mut browser) = self.browser.take() {
            match browser.close().await {
                Ok(()) => debug!("浏览器已关闭"),
                Err(e) => warn!("关闭浏览器失败: {}", e),
            }
        }
    }

    fn mark_on_error<T>(&mut self, result: Result<T, DriverError>) -> StageResult<T> {
        result.map_err(|e| {
            self.broken = true;
            StageError::SessionDisconnected {
                reason: e.to_string(),
            }
        })
    }
}
