use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FailureClass, FailureStage};

/// 提交验证结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// 收到明确的成功信号
    Confirmed,
    /// 没有明确信号，但有迹象表明可能已提交
    AmbiguousButLikely,
    /// 未提交成功（包括超时）
    Failed,
}

/// 重试预算
///
/// 单调消耗，只在新记录开始时重新创建
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    used: u32,
    max: u32,
}

impl RetryBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// 消耗一次机会；预算已用尽时返回 false
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn remaining(&self) -> u32 {
        self.max - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

/// 单条记录的状态机
///
/// `Pending → Attempting → {Succeeded, Retrying, Abandoned}`，`Retrying → Attempting`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Attempting { attempt: u32 },
    Retrying { attempt: u32, failure: FailureClass },
    Succeeded { attempts: u32 },
    Abandoned { attempts: u32, failure: FailureClass },
}

impl RecordState {
    /// 状态迁移是否合法
    pub fn can_transition_to(&self, next: &RecordState) -> bool {
        use RecordState::*;
        match (self, next) {
            (Pending, Attempting { attempt }) => *attempt == 1,
            (Attempting { attempt: a }, Succeeded { attempts })
            | (Attempting { attempt: a }, Abandoned { attempts, .. }) => a == attempts,
            (Attempting { attempt: a }, Retrying { attempt: r, .. }) => a == r,
            (Retrying { attempt: r, .. }, Attempting { attempt }) => *attempt == r + 1,
            _ => false,
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordState::Pending => write!(f, "Pending"),
            RecordState::Attempting { attempt } => write!(f, "Attempting#{}", attempt),
            RecordState::Retrying { attempt, failure } => {
                write!(f, "Retrying#{} ({})", attempt, failure)
            }
            RecordState::Succeeded { attempts } => write!(f, "Succeeded ({} 次)", attempts),
            RecordState::Abandoned { attempts, failure } => {
                write!(f, "Abandoned ({} 次, {})", attempts, failure)
            }
        }
    }
}

/// 记录的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Succeeded,
    Abandoned,
}

/// 单条记录的处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub key: String,
    pub status: RecordStatus,
    pub attempt_count: u32,
    /// 最后一次到达提交阶段时的验证结果
    pub submission: Option<SubmissionOutcome>,
    /// 最后一次失败的类别
    pub last_failure: Option<FailureClass>,
    /// 每次失败尝试的诊断引用
    pub diagnostics: Vec<String>,
}

impl RecordOutcome {
    pub fn is_succeeded(&self) -> bool {
        self.status == RecordStatus::Succeeded
    }
}

/// 失败尝试的诊断事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEvent {
    pub record_key: String,
    pub stage: FailureStage,
    pub failure: FailureClass,
    pub attempt: u32,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

/// 整个批次的处理报告
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    /// 输入记录总数
    pub total: usize,
    /// 按输入顺序排列的处理结果
    pub outcomes: Vec<RecordOutcome>,
    /// 批次提前终止的原因
    pub aborted: Option<String>,
}

impl BatchReport {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            total,
            outcomes: Vec::with_capacity(total),
            aborted: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_succeeded()).count()
    }

    pub fn abandoned(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// 未到达终止状态的记录数量（只在批次终止时非零）
    pub fn unprocessed(&self) -> usize {
        self.total - self.outcomes.len()
    }

    pub fn abandoned_records(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.is_succeeded())
    }

    /// 所有记录都已成功
    pub fn is_clean(&self) -> bool {
        self.aborted.is_none() && self.unprocessed() == 0 && self.abandoned() == 0
    }
}
