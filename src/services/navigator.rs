//! 页面导航服务 - 业务能力层
//!
//! 只负责"把活动页面带到表单地址"，带有限次数的重试

use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::browser::FormPage;
use crate::config::Timings;
use crate::error::{StageError, StageResult};
use crate::models::RetryBudget;

/// 导航服务
pub struct Navigator {
    attempt_timeout: Duration,
    max_attempts: u32,
    retry_delay: Duration,
    post_load_settle: Duration,
}

impl Navigator {
    pub fn new(timings: &Timings) -> Self {
        Self {
            attempt_timeout: timings.navigation_timeout,
            max_attempts: timings.navigation_attempts,
            retry_delay: timings.navigation_retry_delay,
            post_load_settle: timings.post_load_settle,
        }
    }

    /// 导航到 `url`，返回本次使用的导航次数
    ///
    /// 超时与导航错误在预算内重试；连接断开立即上报，不再重试
    pub async fn load<P: FormPage>(&self, page: &P, url: &str) -> StageResult<u32> {
        let mut budget = RetryBudget::new(self.max_attempts);
        let mut last_error = String::from("导航次数为 0");

        while budget.try_consume() {
            debug!("导航到 {} (尝试 {}/{})", url, budget.used(), budget.max());

            match timeout(self.attempt_timeout, page.goto(url)).await {
                Ok(Ok(())) => {
                    if budget.used() > 1 {
                        info!("✓ 第 {} 次导航成功", budget.used());
                    }
                    // 等待页面真正可交互
                    sleep(self.post_load_settle).await;
                    return Ok(budget.used());
                }
                Ok(Err(e)) if e.is_disconnect() => {
                    return Err(StageError::SessionDisconnected {
                        reason: e.to_string(),
                    });
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("导航超过 {} 毫秒", self.attempt_timeout.as_millis())
                }
            }

            warn!(
                "页面加载失败 (尝试 {}/{}): {}",
                budget.used(),
                budget.max(),
                last_error
            );
            if !budget.is_exhausted() {
                sleep(self.retry_delay).await;
            }
        }

        Err(StageError::NavigationExhausted {
            url: url.to_string(),
            attempts: budget.used(),
            reason: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeWorld, FORM_URL};
    use crate::browser::{BrowserHandle, Launcher};
    use crate::error::FailureClass;

    async fn open(world: &FakeWorld) -> crate::browser::fake::FakePage {
        let browser = world.launcher().launch().await.unwrap();
        browser.new_page().await.unwrap()
    }

    #[tokio::test]
    async fn test_load_first_attempt() {
        let world = FakeWorld::standard_form();
        let page = open(&world).await;
        let navigator = Navigator::new(&Timings::fast());

        assert_eq!(navigator.load(&page, FORM_URL).await.unwrap(), 1);
        assert_eq!(page.url().await.unwrap(), FORM_URL);
    }

    #[tokio::test]
    async fn test_load_recovers_after_two_timeouts() {
        let world = FakeWorld::standard_form();
        world.state().goto_failures = 2;
        let page = open(&world).await;
        let navigator = Navigator::new(&Timings::fast());

        assert_eq!(navigator.load(&page, FORM_URL).await.unwrap(), 3);
        assert_eq!(world.state().goto_calls, 3);
    }

    #[tokio::test]
    async fn test_slow_navigation_hits_per_attempt_timeout() {
        let world = FakeWorld::standard_form();
        world.state().goto_delay = Duration::from_millis(500);
        let page = open(&world).await;
        let timings = Timings {
            navigation_timeout: Duration::from_millis(20),
            navigation_attempts: 2,
            ..Timings::fast()
        };

        let err = Navigator::new(&timings).load(&page, FORM_URL).await.unwrap_err();
        assert_eq!(err.class(), FailureClass::NavigationExhausted);
        assert!(matches!(err, StageError::NavigationExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_disconnect_is_not_retried() {
        let world = FakeWorld::standard_form();
        world.state().disconnect_on_goto = Some(1);
        let page = open(&world).await;

        let err = Navigator::new(&Timings::fast())
            .load(&page, FORM_URL)
            .await
            .unwrap_err();
        assert!(err.requires_session_restart());
        assert_eq!(world.state().goto_calls, 1);
    }
}
