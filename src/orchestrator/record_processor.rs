//! 单条记录处理器 - 编排层
//!
//! ## 职责
//!
//! 驱动单条记录的状态机：
//!
//! ```text
//! Pending → Attempting → { Succeeded, Retrying, Abandoned }
//!              ↑______________|
//! ```
//!
//! 1. **重试预算**：每条记录最多尝试 `max_attempts` 次，预算只减不增
//! 2. **诊断**：每次失败的尝试恰好产生一个诊断事件
//! 3. **页面回收**：失败后丢弃页面；会话级错误时整体重启浏览器
//! 4. **成功后回收**：换新页面再进入下一条记录

use chrono::Local;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::{FormPage, Launcher};
use crate::config::Config;
use crate::error::StageError;
use crate::infrastructure::SessionManager;
use crate::models::{
    DiagnosticEvent, Record, RecordOutcome, RecordState, RecordStatus, RetryBudget,
    SubmissionOutcome,
};
use crate::services::DiagnosticsSink;
use crate::workflow::{RecordCtx, RecordFlow};

/// 单条记录的重试策略
#[derive(Debug, Clone, Copy)]
pub struct RecordPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub post_submit_settle: Duration,
}

impl RecordPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_record_attempts.max(1),
            retry_delay: config.timings.retry_delay,
            post_submit_settle: config.timings.post_submit_settle,
        }
    }
}

/// 浏览器无法启动时的终止结果
///
/// `outcome` 保留该记录已经进行过的尝试与诊断引用，状态为放弃
#[derive(Debug)]
pub struct RecordAborted {
    pub error: StageError,
    pub outcome: RecordOutcome,
}

/// 处理单条记录直到终止状态
///
/// # 返回
/// - `Ok(outcome)`：记录已成功或已放弃
/// - `Err(aborted)`：浏览器无法启动，整个批次应当终止
pub async fn process_record<L: Launcher>(
    flow: &RecordFlow,
    sessions: &mut SessionManager<L>,
    sink: &dyn DiagnosticsSink,
    record: &Record,
    mut ctx: RecordCtx,
    policy: &RecordPolicy,
) -> Result<RecordOutcome, RecordAborted> {
    let mut state = RecordState::Pending;
    let mut budget = RetryBudget::new(policy.max_attempts.max(1));
    let mut diagnostics = Vec::new();
    let mut submission = None;

    while budget.try_consume() {
        let attempt = budget.used();
        ctx.next_attempt();
        advance(&mut state, RecordState::Attempting { attempt });
        info!("{} ▶ 开始处理", ctx);

        let err = match flow.attempt(sessions, record, &ctx).await {
            Ok(outcome) => {
                advance(&mut state, RecordState::Succeeded { attempts: attempt });
                info!("{} ✅ 提交成功", ctx);

                sleep(policy.post_submit_settle).await;
                if let Err(e) = sessions.recycle_active_page().await {
                    warn!("{} 回收页面失败，下一条记录将重启会话: {}", ctx, e);
                }

                return Ok(RecordOutcome {
                    key: record.key.clone(),
                    status: RecordStatus::Succeeded,
                    attempt_count: attempt,
                    submission: Some(outcome),
                    last_failure: None,
                    diagnostics,
                });
            }
            Err(e) => e,
        };

        let fatal = err.is_fatal();
        if fatal {
            error!("{} ⛔ {}", ctx, err);
        } else {
            warn!("{} ❌ {} 阶段失败: {}", ctx, err.stage(), err);
        }
        submission = submission_of(&err).or(submission);

        // 先保存现场，再丢弃页面
        if let Some(reference) = capture_diagnostics(sessions, sink, &ctx, &err).await {
            diagnostics.push(reference);
        }
        discard_page(sessions, &ctx, &err).await;

        if fatal || budget.is_exhausted() {
            advance(
                &mut state,
                RecordState::Abandoned {
                    attempts: attempt,
                    failure: err.class(),
                },
            );
            let outcome = RecordOutcome {
                key: record.key.clone(),
                status: RecordStatus::Abandoned,
                attempt_count: attempt,
                submission,
                last_failure: Some(err.class()),
                diagnostics,
            };
            if fatal {
                return Err(RecordAborted {
                    error: err,
                    outcome,
                });
            }
            error!("{} 🚫 已用尽 {} 次尝试，放弃该记录", ctx, budget.max());
            return Ok(outcome);
        }

        advance(
            &mut state,
            RecordState::Retrying {
                attempt,
                failure: err.class(),
            },
        );
        info!(
            "{} 🔁 {} 后重试 (剩余 {} 次)",
            ctx,
            humanize(policy.retry_delay),
            budget.remaining()
        );
        sleep(policy.retry_delay).await;
    }

    // 预算至少为 1，循环只会从内部返回
    Ok(RecordOutcome {
        key: record.key.clone(),
        status: RecordStatus::Abandoned,
        attempt_count: budget.used(),
        submission,
        last_failure: None,
        diagnostics,
    })
}

fn advance(state: &mut RecordState, next: RecordState) {
    debug_assert!(
        state.can_transition_to(&next),
        "非法状态迁移: {} → {}",
        state,
        next
    );
    debug!("状态迁移: {} → {}", state, next);
    *state = next;
}

fn submission_of(err: &StageError) -> Option<SubmissionOutcome> {
    match err {
        StageError::SubmissionAmbiguous { .. } => Some(SubmissionOutcome::AmbiguousButLikely),
        StageError::SubmissionFailed { .. } => Some(SubmissionOutcome::Failed),
        _ => None,
    }
}

/// 保存失败现场；写入失败只记录日志，不影响原始错误的处理
async fn capture_diagnostics<L: Launcher>(
    sessions: &SessionManager<L>,
    sink: &dyn DiagnosticsSink,
    ctx: &RecordCtx,
    err: &StageError,
) -> Option<String> {
    let snapshot = match sessions.current_page() {
        Some(page) => match page.snapshot().await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("{} 截图失败 (忽略): {}", ctx, e);
                None
            }
        },
        None => None,
    };

    let event = DiagnosticEvent {
        record_key: ctx.key.clone(),
        stage: err.stage(),
        failure: err.class(),
        attempt: ctx.attempt,
        message: err.to_string(),
        timestamp: Local::now(),
    };

    match sink.capture(&event, snapshot.as_deref()).await {
        Ok(reference) => {
            info!("{} 📸 诊断已保存: {}", ctx, reference);
            Some(reference)
        }
        Err(e) => {
            warn!("{} 保存诊断失败 (忽略): {}", ctx, e);
            None
        }
    }
}

/// 会话级错误时整体重启，否则只替换页面
async fn discard_page<L: Launcher>(
    sessions: &mut SessionManager<L>,
    ctx: &RecordCtx,
    err: &StageError,
) {
    if err.requires_session_restart() {
        warn!("{} 会话已损坏，关闭浏览器，下次尝试时重新启动", ctx);
        sessions.teardown().await;
        return;
    }
    if let Err(e) = sessions.recycle_active_page().await {
        warn!("{} 替换页面失败，关闭浏览器: {}", ctx, e);
        sessions.teardown().await;
    }
}

fn humanize(delay: Duration) -> String {
    if delay.as_millis() >= 1000 {
        format!("{} 秒", delay.as_secs())
    } else {
        format!("{} 毫秒", delay.as_millis())
    }
}
