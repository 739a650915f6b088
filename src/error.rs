use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器驱动错误
    #[error("浏览器错误: {0}")]
    Driver(#[from] DriverError),
    /// 流程阶段错误
    #[error("阶段错误: {0}")]
    Stage(#[from] StageError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器驱动层错误
///
/// 只描述"浏览器发生了什么"，不关心当前处于哪个流程阶段
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// 浏览器进程或 CDP 连接已断开
    #[error("浏览器连接已断开")]
    Disconnected,
    /// 启动或连接浏览器失败
    #[error("浏览器启动失败: {0}")]
    Launch(String),
    /// 操作超时
    #[error("操作超时: {0}")]
    Timeout(String),
    /// 目标元素不存在（可能已被页面替换）
    #[error("元素不存在: {selector}[{index}]")]
    NoSuchElement { selector: String, index: usize },
    /// 页面已关闭
    #[error("页面已关闭: {0}")]
    PageClosed(String),
    /// 其他 CDP 错误
    #[error("CDP 错误: {0}")]
    Cdp(String),
}

impl DriverError {
    /// 是否属于会话级故障（需要重启浏览器）
    pub fn is_disconnect(&self) -> bool {
        matches!(self, DriverError::Disconnected)
    }
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::Timeout => DriverError::Timeout("CDP 请求超时".to_string()),
            CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
                DriverError::Disconnected
            }
            other => DriverError::Cdp(other.to_string()),
        }
    }
}

/// 单条记录处理过程中的阶段错误
///
/// 每个变体对应一种失败类别，由编排层统一捕获并转换为状态机迁移
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// 浏览器启动失败且启动重试次数已用尽，整个批次终止
    #[error("浏览器会话启动失败 (已尝试 {attempts} 次): {reason}")]
    SessionLaunchFailed { attempts: u32, reason: String },
    /// 检测到会话级故障，需要整体重启浏览器
    #[error("浏览器会话已断开: {reason}")]
    SessionDisconnected { reason: String },
    /// 导航重试全部失败
    #[error("导航到 {url} 失败 (已尝试 {attempts} 次): {reason}")]
    NavigationExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },
    /// 角色在超时前未达到最小元素数量
    #[error("未找到足够的元素: 角色 {role} 需要至少 {min_count} 个, 实际最多 {found} 个")]
    ElementNotFound {
        role: String,
        min_count: usize,
        found: usize,
    },
    /// 元素解析成功后，具体字段交互失败
    #[error("字段 {field} 填写失败: {reason}")]
    FillFailed { field: String, reason: String },
    /// 没有明确的成功信号，但有迹象表明可能已提交
    #[error("提交结果不明确 (当前 URL: {url})")]
    SubmissionAmbiguous { url: String },
    /// 确定未提交成功
    #[error("提交失败: {reason}")]
    SubmissionFailed { reason: String },
}

/// 失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Session,
    Navigate,
    Resolve,
    Fill,
    Submit,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Session => "session",
            FailureStage::Navigate => "navigate",
            FailureStage::Resolve => "resolve",
            FailureStage::Fill => "fill",
            FailureStage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// 失败类别（用于审计报告）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    SessionLaunchFailed,
    SessionDisconnected,
    NavigationExhausted,
    ElementNotFound,
    FillFailed,
    SubmissionAmbiguous,
    SubmissionFailed,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureClass::SessionLaunchFailed => "SessionLaunchFailed",
            FailureClass::SessionDisconnected => "SessionDisconnected",
            FailureClass::NavigationExhausted => "NavigationExhausted",
            FailureClass::ElementNotFound => "ElementNotFound",
            FailureClass::FillFailed => "FillFailed",
            FailureClass::SubmissionAmbiguous => "SubmissionAmbiguous",
            FailureClass::SubmissionFailed => "SubmissionFailed",
        };
        f.write_str(name)
    }
}

impl StageError {
    pub fn class(&self) -> FailureClass {
        match self {
            StageError::SessionLaunchFailed { .. } => FailureClass::SessionLaunchFailed,
            StageError::SessionDisconnected { .. } => FailureClass::SessionDisconnected,
            StageError::NavigationExhausted { .. } => FailureClass::NavigationExhausted,
            StageError::ElementNotFound { .. } => FailureClass::ElementNotFound,
            StageError::FillFailed { .. } => FailureClass::FillFailed,
            StageError::SubmissionAmbiguous { .. } => FailureClass::SubmissionAmbiguous,
            StageError::SubmissionFailed { .. } => FailureClass::SubmissionFailed,
        }
    }

    pub fn stage(&self) -> FailureStage {
        match self {
            StageError::SessionLaunchFailed { .. } | StageError::SessionDisconnected { .. } => {
                FailureStage::Session
            }
            StageError::NavigationExhausted { .. } => FailureStage::Navigate,
            StageError::ElementNotFound { .. } => FailureStage::Resolve,
            StageError::FillFailed { .. } => FailureStage::Fill,
            StageError::SubmissionAmbiguous { .. } | StageError::SubmissionFailed { .. } => {
                FailureStage::Submit
            }
        }
    }

    /// 是否需要整体重启浏览器（否则只替换页面）
    pub fn requires_session_restart(&self) -> bool {
        matches!(
            self,
            StageError::SessionDisconnected { .. } | StageError::SessionLaunchFailed { .. }
        )
    }

    /// 是否终止整个批次
    pub fn is_fatal(&self) -> bool {
        matches!(self, StageError::SessionLaunchFailed { .. })
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 文件内容解析失败
    #[error("解析文件失败 ({path}): {reason}")]
    ParseFailed { path: String, reason: String },
    /// 不支持的文件格式
    #[error("不支持的文件格式: {path}")]
    UnsupportedFormat { path: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 表单契约不完整
    #[error("表单契约无效: {0}")]
    InvalidContract(String),
    /// 指定的起止记录不存在
    #[error("起止记录不存在: start={start} (找到: {start_found}), end={end} (找到: {end_found})；前几条记录: {preview}")]
    RangeKeyNotFound {
        start: String,
        end: String,
        start_found: bool,
        end_found: bool,
        preview: String,
    },
}

// ========== 便捷构造函数 ==========

impl FileError {
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return FileError::NotFound { path: path.into() };
        }
        FileError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn parse_failed(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        FileError::ParseFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl StageError {
    /// 将驱动错误转换为填写失败；连接断开时升级为会话级错误
    pub fn from_fill(field: impl Into<String>, err: DriverError) -> Self {
        if err.is_disconnect() {
            return StageError::SessionDisconnected {
                reason: err.to_string(),
            };
        }
        StageError::FillFailed {
            field: field.into(),
            reason: err.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 阶段结果类型
pub type StageResult<T> = Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_requires_session_restart() {
        let err = StageError::SessionDisconnected {
            reason: "handler ended".to_string(),
        };
        assert!(err.requires_session_restart());
        assert!(!err.is_fatal());
        assert_eq!(err.stage(), FailureStage::Session);
    }

    #[test]
    fn test_page_level_failures_keep_session() {
        let errors = [
            StageError::ElementNotFound {
                role: "choice".to_string(),
                min_count: 14,
                found: 3,
            },
            StageError::FillFailed {
                field: "email".to_string(),
                reason: "stale".to_string(),
            },
            StageError::SubmissionAmbiguous {
                url: "https://example.test/ResponsePage.aspx".to_string(),
            },
        ];
        for err in errors {
            assert!(!err.requires_session_restart(), "{err}");
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn test_fill_error_upgrades_disconnect() {
        let err = StageError::from_fill("email", DriverError::Disconnected);
        assert_eq!(err.class(), FailureClass::SessionDisconnected);

        let err = StageError::from_fill(
            "email",
            DriverError::NoSuchElement {
                selector: "input".to_string(),
                index: 2,
            },
        );
        assert_eq!(err.class(), FailureClass::FillFailed);
        assert_eq!(err.stage(), FailureStage::Fill);
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            FileError::read_failed("records.json", io),
            FileError::NotFound { .. }
        ));
    }
}
