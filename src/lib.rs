//! # Form Batch Submit
//!
//! 一个用于批量提交网页表单的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 浏览器驱动能力（`Launcher` / `BrowserHandle` / `FormPage`）
//! - `infrastructure/` - 持有稀缺资源（浏览器、活动页面），只暴露能力
//! - `SessionManager` - 唯一的浏览器 owner，负责启动、断线重启、页面回收
//! - `JsExecutor` - 页面脚本执行能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面
//! - `Navigator` - 带重试的导航能力
//! - `FieldResolver` - 多候选选择器的元素解析能力
//! - `FormFiller` - 按计划填写能力
//! - `SubmissionVerifier` - 提交并判定结果的能力
//! - `DiagnosticsSink` - 保存失败现场的能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条记录的一次尝试"的完整流程
//! - `RecordCtx` - 上下文封装（记录键 + 序号 + 尝试次数）
//! - `RecordFlow` - 流程编排（navigate → resolve → fill → submit）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理资源与统计
//! - `orchestrator/record_processor` - 单条记录的状态机与重试
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, Timings};
pub use error::{AppError, AppResult, StageError};
pub use infrastructure::{JsExecutor, SessionManager};
pub use models::{BatchReport, FormContract, Record, RecordOutcome, SubmissionOutcome};
pub use orchestrator::App;
pub use workflow::{RecordCtx, RecordFlow};
