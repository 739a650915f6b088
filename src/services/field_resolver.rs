//! 元素解析服务 - 业务能力层
//!
//! 按定位策略表的顺序尝试候选选择器，直到某个候选满足最少数量或超时。
//! 只保证存在性与数量，不保证语义；按位置映射由填写计划负责。

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::FormPage;
use crate::config::Timings;
use crate::error::{StageError, StageResult};
use crate::models::LocatorStrategy;

/// 已解析的角色
///
/// 只在解析时的页面上有效；页面被替换或重新导航后必须重新解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub role: String,
    /// 命中的候选选择器
    pub selector: String,
    /// 解析时匹配到的元素数量
    pub count: usize,
    /// 解析时所在页面
    pub page_id: String,
}

impl ResolvedRole {
    /// 是否属于指定页面
    pub fn belongs_to<P: FormPage>(&self, page: &P) -> bool {
        self.page_id == page.id()
    }
}

/// 一次尝试中解析出的全部角色
#[derive(Debug, Clone, Default)]
pub struct ResolvedRoles {
    roles: Vec<ResolvedRole>,
}

impl ResolvedRoles {
    pub fn get(&self, role: &str) -> Option<&ResolvedRole> {
        self.roles.iter().find(|r| r.role == role)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// 元素解析服务
pub struct FieldResolver {
    timeout: Duration,
    poll_interval: Duration,
}

impl FieldResolver {
    pub fn new(timings: &Timings) -> Self {
        Self {
            timeout: timings.resolve_timeout,
            poll_interval: timings.poll_interval,
        }
    }

    /// 解析单个角色
    pub async fn resolve<P: FormPage>(
        &self,
        page: &P,
        strategy: &LocatorStrategy,
    ) -> StageResult<ResolvedRole> {
        let deadline = Instant::now() + self.timeout;
        let mut best = 0;

        loop {
            for candidate in &strategy.candidates {
                match page.count(candidate).await {
                    Ok(count) if count >= strategy.min_count => {
                        debug!(
                            "角色 {} 命中 {} ({} 个元素)",
                            strategy.role, candidate, count
                        );
                        return Ok(ResolvedRole {
                            role: strategy.role.clone(),
                            selector: candidate.clone(),
                            count,
                            page_id: page.id(),
                        });
                    }
                    Ok(count) => best = best.max(count),
                    Err(e) if e.is_disconnect() => {
                        return Err(StageError::SessionDisconnected {
                            reason: e.to_string(),
                        });
                    }
                    // 页面尚未可交互时查询可能失败，继续轮询
                    Err(e) => debug!("查询 {} 失败 (忽略): {}", candidate, e),
                }
            }

            if Instant::now() >= deadline {
                return Err(StageError::ElementNotFound {
                    role: strategy.role.clone(),
                    min_count: strategy.min_count,
                    found: best,
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    /// 依次解析多个角色；任何一个失败即停止
    pub async fn resolve_all<P: FormPage>(
        &self,
        page: &P,
        strategies: &[&LocatorStrategy],
    ) -> StageResult<ResolvedRoles> {
        let mut resolved = ResolvedRoles::default();
        for strategy in strategies {
            resolved.roles.push(self.resolve(page, strategy).await?);
        }
        Ok(resolved)
    }
}
