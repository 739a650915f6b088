//! 提交验证服务 - 业务能力层
//!
//! 点击提交后，在同一期限内竞争三个独立的成功信号：
//! 1. 页面地址发生变化
//! 2. 出现明确的提示元素
//! 3. 页面文本包含成功短语，或地址不再匹配回答页模式
//!
//! 远端表单不提供可靠的成功回执，"可能成功"作为独立结果保留，不强行归为成功或失败。

use regex::Regex;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::browser::FormPage;
use crate::config::Timings;
use crate::error::{ConfigError, DriverError, StageError, StageResult};
use crate::models::{FormContract, SubmissionOutcome};
use crate::services::field_resolver::ResolvedRole;

/// 触发结束等待的信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessSignal {
    NavigatedAway,
    Marker,
    SuccessText,
    LeftResponsePage,
}

/// 提交验证服务
pub struct SubmissionVerifier {
    deadline: Duration,
    poll_interval: Duration,
    resubmit_delay: Duration,
    response_page: Regex,
    success_phrases: Vec<String>,
    success_markers: Vec<String>,
}

impl SubmissionVerifier {
    pub fn new(contract: &FormContract, timings: &Timings) -> Result<Self, ConfigError> {
        Ok(Self {
            deadline: timings.submission_timeout,
            poll_interval: timings.poll_interval,
            resubmit_delay: timings.resubmit_delay,
            response_page: contract.response_page_regex()?,
            success_phrases: contract.success_phrases.clone(),
            success_markers: contract.success_markers.clone(),
        })
    }

    /// 点击提交并判定结果
    ///
    /// 期限内没有任何信号且提交按钮仍然可用时，允许再点击一次
    pub async fn submit_and_verify<P: FormPage>(
        &self,
        page: &P,
        submit: &ResolvedRole,
    ) -> StageResult<SubmissionOutcome> {
        if !submit.belongs_to(page) {
            return Err(StageError::SubmissionFailed {
                reason: "提交按钮引用来自已被替换的页面".to_string(),
            });
        }

        let before = page.url().await.map_err(submit_error)?;
        // 提交前就不在回答页时，地址模式不能作为成功依据
        let watch_pattern = self.response_page.is_match(&before);
        if !watch_pattern {
            warn!(
                "⚠️ 提交前地址不匹配回答页模式，只依据跳转与页面内容判断: {}",
                before
            );
        }

        self.click_submit(page, submit).await?;
        let mut resubmitted = false;

        loop {
            if let Some(signal) = self.race_signals(page, &before, watch_pattern).await? {
                debug!("收到成功信号: {:?}", signal);
                return self.disambiguate(page, signal, watch_pattern).await;
            }

            if !resubmitted && self.submit_still_present(page, submit).await? {
                resubmitted = true;
                warn!("⚠️ 期限内未收到成功信号，提交按钮仍在，重新点击一次...");
                sleep(self.resubmit_delay).await;
                self.click_submit(page, submit).await?;
                continue;
            }

            // 没有信号时只剩地址这一条旁证
            let url = tolerate(page.url().await)
                .map_err(submit_error)?
                .unwrap_or_default();
            if watch_pattern && self.left_response_page(&url) {
                return Ok(SubmissionOutcome::AmbiguousButLikely);
            }
            return Ok(SubmissionOutcome::Failed);
        }
    }

    async fn click_submit<P: FormPage>(&self, page: &P, submit: &ResolvedRole) -> StageResult<()> {
        debug!("点击提交按钮: {}", submit.selector);
        page.click(&submit.selector, 0).await.map_err(submit_error)
    }

    async fn submit_still_present<P: FormPage>(
        &self,
        page: &P,
        submit: &ResolvedRole,
    ) -> StageResult<bool> {
        let enabled = tolerate(page.is_enabled(&submit.selector, 0).await)
            .map_err(submit_error)?;
        Ok(enabled.unwrap_or(false))
    }

    /// 竞争三个信号；期限内无信号返回 None
    async fn race_signals<P: FormPage>(
        &self,
        page: &P,
        before: &str,
        watch_pattern: bool,
    ) -> StageResult<Option<SuccessSignal>> {
        let race = async {
            tokio::select! {
                signal = self.wait_navigation(page, before) => signal,
                signal = self.wait_marker(page) => signal,
                signal = self.wait_content(page, watch_pattern) => signal,
            }
        };

        match timeout(self.deadline, race).await {
            Ok(Ok(signal)) => Ok(Some(signal)),
            Ok(Err(e)) => Err(submit_error(e)),
            Err(_) => Ok(None),
        }
    }

    async fn wait_navigation<P: FormPage>(
        &self,
        page: &P,
        before: &str,
    ) -> Result<SuccessSignal, DriverError> {
        loop {
            if let Some(url) = tolerate(page.url().await)? {
                if url != before {
                    return Ok(SuccessSignal::NavigatedAway);
                }
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn wait_marker<P: FormPage>(&self, page: &P) -> Result<SuccessSignal, DriverError> {
        if self.success_markers.is_empty() {
            return std::future::pending().await;
        }
        loop {
            for marker in &self.success_markers {
                if tolerate(page.count(marker).await)?.unwrap_or(0) > 0 {
                    return Ok(SuccessSignal::Marker);
                }
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn wait_content<P: FormPage>(
        &self,
        page: &P,
        watch_pattern: bool,
    ) -> Result<SuccessSignal, DriverError> {
        loop {
            if let Some(text) = tolerate(page.body_text().await)? {
                if self.contains_success_phrase(&text) {
                    return Ok(SuccessSignal::SuccessText);
                }
            }
            if watch_pattern {
                if let Some(url) = tolerate(page.url().await)? {
                    if self.left_response_page(&url) {
                        return Ok(SuccessSignal::LeftResponsePage);
                    }
                }
            }
            sleep(self.poll_interval).await;
        }
    }

    /// 有信号后再确认一次：仍停留在回答页时需要成功短语才算确认
    async fn disambiguate<P: FormPage>(
        &self,
        page: &P,
        signal: SuccessSignal,
        watch_pattern: bool,
    ) -> StageResult<SubmissionOutcome> {
        if watch_pattern {
            let url = tolerate(page.url().await).map_err(submit_error)?;
            if url.is_some_and(|u| self.left_response_page(&u)) {
                info!("✓ 已离开回答页，提交确认");
                return Ok(SubmissionOutcome::Confirmed);
            }
        }

        let text = tolerate(page.body_text().await)
            .map_err(submit_error)?
            .unwrap_or_default();
        if self.contains_success_phrase(&text) {
            info!("✓ 页面出现成功提示，提交确认");
            return Ok(SubmissionOutcome::Confirmed);
        }

        warn!("⚠️ 收到信号 {:?} 但仍停留在回答页且没有成功提示", signal);
        Ok(SubmissionOutcome::AmbiguousButLikely)
    }

    fn left_response_page(&self, url: &str) -> bool {
        !url.is_empty() && !self.response_page.is_match(url)
    }

    fn contains_success_phrase(&self, text: &str) -> bool {
        self.success_phrases
            .iter()
            .any(|p| !p.is_empty() && text.contains(p.as_str()))
    }
}

/// 轮询中的临时错误按"暂无结果"处理，只有断线向上传播
fn tolerate<T>(result: Result<T, DriverError>) -> Result<Option<T>, DriverError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_disconnect() => Err(e),
        Err(e) => {
            debug!("验证轮询失败 (忽略): {}", e);
            Ok(None)
        }
    }
}

fn submit_error(err: DriverError) -> StageError {
    if err.is_disconnect() {
        StageError::SessionDisconnected {
            reason: err.to_string(),
        }
    } else {
        StageError::SubmissionFailed {
            reason: err.to_string(),
        }
    }
}
