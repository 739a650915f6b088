//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量记录处理器
//! - 管理应用生命周期（初始化、运行、清理）
//! - 按输入顺序处理记录（Vec<Record>）
//! - 持有浏览器会话，输出全局统计与结果报告
//!
//! ### `record_processor` - 单条记录处理器
//! - 驱动单条记录的状态机与重试预算
//! - 每次失败保存诊断并丢弃页面
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Record>)
//!     ↓
//! record_processor (处理单条 Record 的多次尝试)
//!     ↓
//! workflow::RecordFlow (处理单次尝试)
//!     ↓
//! services (能力层：navigate / resolve / fill / verify / diagnostics)
//!     ↓
//! infrastructure (基础设施：SessionManager、JsExecutor)
//! ```

pub mod batch_processor;
pub mod record_processor;

pub use batch_processor::{process_batch, App};
pub use record_processor::{process_record, RecordAborted, RecordPolicy};
