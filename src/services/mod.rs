//! 业务能力层
//!
//! 每个服务只描述"对一条记录的一个页面能做什么"，不关心流程顺序

pub mod diagnostics;
pub mod field_resolver;
pub mod form_filler;
pub mod navigator;
pub mod report_writer;
pub mod submission_verifier;

pub use diagnostics::{DiagnosticsSink, FileDiagnosticsSink};
pub use field_resolver::{FieldResolver, ResolvedRole, ResolvedRoles};
pub use form_filler::FormFiller;
pub use navigator::Navigator;
pub use report_writer::save_report;
pub use submission_verifier::{SubmissionVerifier, SuccessSignal};
