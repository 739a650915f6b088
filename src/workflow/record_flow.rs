//! 记录处理流程 - 流程层
//!
//! 核心职责：定义"一条记录的一次尝试"的完整处理流程
//!
//! 流程顺序：
//! 1. 取得活动页面（必要时重启会话）
//! 2. 导航到表单
//! 3. 解析填写计划需要的元素角色
//! 4. 按计划填写
//! 5. 提交并验证

use tracing::{debug, info, warn};

use crate::browser::{FormPage, Launcher};
use crate::config::Config;
use crate::error::{ConfigError, StageError, StageResult};
use crate::infrastructure::SessionManager;
use crate::models::{FormContract, Record, SubmissionOutcome};
use crate::services::{FieldResolver, FormFiller, Navigator, SubmissionVerifier};
use crate::workflow::record_ctx::RecordCtx;

/// 记录处理流程
///
/// - 编排单次尝试的阶段顺序
/// - 不持有任何资源（page），每次从会话管理器借用
/// - 只依赖业务能力（services）
pub struct RecordFlow {
    contract: FormContract,
    navigator: Navigator,
    resolver: FieldResolver,
    filler: FormFiller,
    verifier: SubmissionVerifier,
}

impl RecordFlow {
    pub fn new(contract: FormContract, config: &Config) -> Result<Self, ConfigError> {
        let timings = &config.timings;
        Ok(Self {
            verifier: SubmissionVerifier::new(&contract, timings)?,
            navigator: Navigator::new(timings),
            resolver: FieldResolver::new(timings),
            filler: FormFiller::new(timings),
            contract,
        })
    }

    /// 执行一次完整尝试
    ///
    /// 只有确认提交成功才返回 `Ok`；"可能成功"与失败都作为错误交给重试状态机
    pub async fn attempt<L: Launcher>(
        &self,
        sessions: &mut SessionManager<L>,
        record: &Record,
        ctx: &RecordCtx,
    ) -> StageResult<SubmissionOutcome> {
        let page = sessions.active_page().await?;
        debug!(
            "{} 记录字段: {}",
            ctx,
            record.fields().map(|(name, _)| name).collect::<Vec<_>>().join(", ")
        );

        // ========== 阶段 1: 导航 ==========
        let loads = self.navigator.load(&page, &self.contract.url).await?;
        debug!("{} 表单已加载 (导航 {} 次)", ctx, loads);

        // ========== 阶段 2: 解析元素 ==========
        let resolved = self
            .resolver
            .resolve_all(&page, &self.contract.required_roles())
            .await?;
        debug!("{} 已解析 {} 个角色", ctx, resolved.len());

        // ========== 阶段 3: 填写 ==========
        let performed = self
            .filler
            .fill(&page, record, &self.contract.plan, &resolved)
            .await?;
        info!("{} ✓ 已填写 {} 个字段，准备提交", ctx, performed);

        // ========== 阶段 4: 提交并验证 ==========
        let submit = resolved
            .get(&self.contract.submit_role)
            .ok_or_else(|| StageError::SubmissionFailed {
                reason: format!("提交角色 {} 未解析", self.contract.submit_role),
            })?;

        match self.verifier.submit_and_verify(&page, submit).await? {
            SubmissionOutcome::Confirmed => Ok(SubmissionOutcome::Confirmed),
            SubmissionOutcome::AmbiguousButLikely => {
                let url = page.url().await.unwrap_or_default();
                warn!("{} ⚠️ 提交结果不明确 (当前地址: {})", ctx, url);
                Err(StageError::SubmissionAmbiguous { url })
            }
            SubmissionOutcome::Failed => Err(StageError::SubmissionFailed {
                reason: "期限内没有任何成功信号".to_string(),
            }),
        }
    }
}
