//! 批量记录处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量记录的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载表单契约、记录文件与处理范围
//! 2. **顺序处理**：按输入顺序逐条处理，同一时刻只有一条记录在尝试
//! 3. **资源管理**：持有会话管理器，所有退出路径都关闭浏览器
//! 4. **全局统计**：汇总每条记录的结果并写入报告
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单条记录的细节
//! - **资源所有者**：唯一持有浏览器会话的模块
//! - **向下委托**：委托 record_processor 处理单条记录

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::path::Path;
use tracing::{error, info, warn};

use crate::browser::{ChromeLauncher, LaunchOptions, Launcher};
use crate::config::Config;
use crate::infrastructure::{LaunchPolicy, SessionManager};
use crate::models::{load_records, select_range, BatchReport, FormContract, Record};
use crate::orchestrator::record_processor::{process_record, RecordPolicy};
use crate::services::{save_report, DiagnosticsSink, FileDiagnosticsSink};
use crate::utils::logging;
use crate::workflow::{RecordCtx, RecordFlow};

/// 应用主结构
pub struct App {
    config: Config,
    flow: RecordFlow,
    sessions: SessionManager<ChromeLauncher>,
    sink: FileDiagnosticsSink,
    records: Vec<Record>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let contract = match &config.form_contract_file {
            Some(path) => {
                info!("📄 从 {} 加载表单契约", path);
                FormContract::from_toml_file(Path::new(path))
                    .with_context(|| format!("加载表单契约失败: {}", path))?
            }
            None => FormContract::default(),
        };
        contract.validate()?;

        logging::log_startup(&contract.url, config.max_record_attempts);

        info!("\n📁 正在加载记录: {}", config.records_file);
        let records = load_records(Path::new(&config.records_file), &contract, &config)
            .await
            .with_context(|| format!("加载记录文件失败: {}", config.records_file))?;
        let records = select_range(
            records,
            config.start_key.as_deref(),
            config.end_key.as_deref(),
        )?;
        logging::log_records_loaded(
            records.len(),
            records.first().map(|r| r.key.as_str()),
            records.last().map(|r| r.key.as_str()),
        );

        let launcher = ChromeLauncher::new(LaunchOptions {
            headless: config.headless,
            executable: config.chrome_executable.clone(),
            debug_port: config.browser_debug_port,
        });
        let sessions = SessionManager::new(launcher, launch_policy(&config));

        Ok(Self {
            flow: RecordFlow::new(contract, &config)?,
            sink: FileDiagnosticsSink::new(&config.diagnostics_dir),
            sessions,
            records,
            config,
        })
    }

    /// 运行应用主逻辑
    ///
    /// 有记录被放弃或批次提前终止时返回错误，使进程以非零状态退出
    pub async fn run(mut self) -> Result<()> {
        if self.records.is_empty() {
            warn!("⚠️ 没有找到待处理的记录，程序结束");
            return Ok(());
        }

        let policy = RecordPolicy::from_config(&self.config);
        let report = process_batch(
            &self.flow,
            &mut self.sessions,
            &self.sink,
            &self.records,
            &policy,
        )
        .await;

        logging::print_final_stats(&report, &self.config.report_file);
        if let Err(e) = save_report(&report, &self.config.report_file).await {
            error!("保存结果报告失败: {}", e);
        }

        if let Some(reason) = &report.aborted {
            bail!("批次提前终止: {}", reason);
        }
        if report.abandoned() > 0 {
            bail!("{} 条记录被放弃", report.abandoned());
        }
        Ok(())
    }
}

fn launch_policy(config: &Config) -> LaunchPolicy {
    LaunchPolicy {
        attempts: config.launch_attempts.max(1),
        retry_delay: config.timings.launch_retry_delay,
        page_settle: config.timings.page_settle,
    }
}

/// 顺序处理所有记录
///
/// 单条记录被放弃不影响后续记录；只有浏览器无法启动时提前终止。
/// 返回前总会关闭浏览器。
pub async fn process_batch<L: Launcher>(
    flow: &RecordFlow,
    sessions: &mut SessionManager<L>,
    sink: &dyn DiagnosticsSink,
    records: &[Record],
    policy: &RecordPolicy,
) -> BatchReport {
    let total = records.len();
    let mut report = BatchReport::new(total);

    for (idx, record) in records.iter().enumerate() {
        let ctx = RecordCtx::new(record.key.clone(), idx + 1, total);
        log_record_start(idx + 1, total, &record.key);

        match process_record(flow, sessions, sink, record, ctx, policy).await {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(aborted) => {
                error!("⛔ 无法建立浏览器会话，终止批次: {}", aborted.error);
                report.aborted = Some(aborted.error.to_string());
                report.outcomes.push(aborted.outcome);
                break;
            }
        }
    }

    sessions.teardown().await;
    info!("🌐 本批次共启动浏览器 {} 次", sessions.launches());
    report.finished_at = Some(Local::now());
    report
}

// ========== 日志辅助函数 ==========

fn log_record_start(index: usize, total: usize, key: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📨 [记录 {}/{}] {}", index, total, key);
    info!("{}", "─".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeLauncher, FakeWorld, SubmitEffect};
    use crate::config::Timings;
    use crate::error::FailureClass;
    use crate::models::RecordStatus;
    use crate::services::diagnostics::MemorySink;
    use std::time::Duration;

    const DONE: &str = "https://forms.example.test/done";

    fn config() -> Config {
        Config {
            timings: Timings::fast(),
            ..Config::default()
        }
    }

    fn records(keys: &[&str]) -> Vec<Record> {
        keys.iter()
            .map(|k| {
                Record::new(*k)
                    .with_field("email", *k)
                    .with_field("teacher_code", "AB-1")
                    .with_field("feedback", "ok")
            })
            .collect()
    }

    async fn run(world: &FakeWorld, sink: &MemorySink, keys: &[&str]) -> BatchReport {
        let config = config();
        let flow = RecordFlow::new(FormContract::default(), &config).unwrap();
        let mut sessions: SessionManager<FakeLauncher> = SessionManager::new(
            world.launcher(),
            LaunchPolicy {
                attempts: 2,
                retry_delay: Duration::ZERO,
                page_settle: Duration::ZERO,
            },
        );
        let report = process_batch(
            &flow,
            &mut sessions,
            sink,
            &records(keys),
            &RecordPolicy::from_config(&config),
        )
        .await;
        assert!(!sessions.is_live(), "批次结束后浏览器应已关闭");
        report
    }

    #[tokio::test]
    async fn test_happy_path() {
        let world = FakeWorld::standard_form();
        world.on_submit([SubmitEffect::Navigate(DONE.into())]);
        let sink = MemorySink::default();

        let report = run(&world, &sink, &["a@example.com"]).await;

        assert!(report.is_clean());
        assert_eq!(report.outcomes[0].attempt_count, 1);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_transient_navigation_failures_stay_within_one_attempt() {
        let world = FakeWorld::standard_form();
        world.state().goto_failures = 2;
        world.on_submit([SubmitEffect::Navigate(DONE.into())]);
        let sink = MemorySink::default();

        let report = run(&world, &sink, &["a@example.com"]).await;

        assert!(report.is_clean());
        assert_eq!(report.outcomes[0].attempt_count, 1);
        assert_eq!(world.state().goto_calls, 3);
    }

    #[tokio::test]
    async fn test_disconnect_mid_batch_relaunches_without_revisiting() {
        let world = FakeWorld::standard_form();
        // 第二条记录的第一次导航时断线
        world.state().disconnect_on_goto = Some(2);
        world.on_submit([
            SubmitEffect::Navigate(DONE.into()),
            SubmitEffect::Navigate(DONE.into()),
        ]);
        let sink = MemorySink::default();

        let report = run(&world, &sink, &["a@example.com", "b@example.com"]).await;

        assert!(report.is_clean());
        assert_eq!(report.outcomes[0].key, "a@example.com");
        assert_eq!(report.outcomes[0].attempt_count, 1);
        assert_eq!(report.outcomes[1].key, "b@example.com");
        assert_eq!(report.outcomes[1].attempt_count, 2);
        assert_eq!(world.state().launches, 2);
        assert_eq!(world.submit_clicks(), 2);
        assert_eq!(sink.count_for("a@example.com"), 0);
        assert_eq!(sink.count_for("b@example.com"), 1);
    }

    #[tokio::test]
    async fn test_abandoned_record_does_not_halt_batch() {
        let world = FakeWorld::standard_form();
        // 第一条记录三次尝试都没有成功信号，第二条成功
        world.on_submit([
            SubmitEffect::Nothing,
            SubmitEffect::Nothing,
            SubmitEffect::Nothing,
            SubmitEffect::Nothing,
            SubmitEffect::Nothing,
            SubmitEffect::Nothing,
            SubmitEffect::Navigate(DONE.into()),
        ]);
        let sink = MemorySink::default();

        let report = run(&world, &sink, &["a@example.com", "b@example.com"]).await;

        assert_eq!(report.outcomes.len(), 2);
        let first = &report.outcomes[0];
        assert_eq!(first.status, RecordStatus::Abandoned);
        assert_eq!(first.attempt_count, 3);
        assert_eq!(first.last_failure, Some(FailureClass::SubmissionFailed));
        assert_eq!(sink.count_for("a@example.com"), 3);
        assert!(report.outcomes[1].is_succeeded());
        assert_eq!(report.abandoned(), 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_launch_failure_aborts_batch() {
        let world = FakeWorld::standard_form();
        world.state().launch_failures = 5;
        let sink = MemorySink::default();

        let report = run(&world, &sink, &["a@example.com", "b@example.com"]).await;

        assert!(report.aborted.is_some());
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].status, RecordStatus::Abandoned);
        assert_eq!(
            report.outcomes[0].last_failure,
            Some(FailureClass::SessionLaunchFailed)
        );
        assert_eq!(report.unprocessed(), 1);
    }

    #[tokio::test]
    async fn test_relaunch_failure_reports_in_flight_record() {
        let world = FakeWorld::standard_form();
        world.state().disconnect_on_goto = Some(1);
        world.state().fail_relaunch = true;
        let sink = MemorySink::default();

        let report = run(&world, &sink, &["a@example.com", "b@example.com"]).await;

        assert!(report.aborted.is_some());
        assert_eq!(report.outcomes.len(), 1);
        let first = &report.outcomes[0];
        assert_eq!(first.key, "a@example.com");
        assert_eq!(first.attempt_count, 2);
        assert_eq!(first.diagnostics.len(), 2);
        assert_eq!(report.abandoned_records().count(), 1);
        assert_eq!(report.unprocessed(), 1);
        assert_eq!(sink.count_for("b@example.com"), 0);
    }
}
