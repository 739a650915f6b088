//! 记录处理上下文
//!
//! 封装"我正在处理第几条记录的第几次尝试"这一信息

use std::fmt::Display;

/// 记录处理上下文
#[derive(Debug, Clone)]
pub struct RecordCtx {
    /// 记录键
    pub key: String,

    /// 记录在批次中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 批次记录总数
    pub total: usize,

    /// 当前尝试次数（从1开始）
    pub attempt: u32,
}

impl RecordCtx {
    pub fn new(key: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            key: key.into(),
            index,
            total,
            attempt: 0,
        }
    }

    /// 进入下一次尝试
    pub fn next_attempt(&mut self) {
        self.attempt += 1;
    }
}

impl Display for RecordCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[记录 {}/{} {} 尝试#{}]",
            self.index, self.total, self.key, self.attempt
        )
    }
}
