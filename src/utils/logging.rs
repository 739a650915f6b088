/// 日志工具模块
///
/// 提供日志初始化以及批次进度输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::BatchReport;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则按 `verbose` 选择 debug 或 info 级别
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(url: &str, max_attempts: u32) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 表单批量提交模式");
    info!("🌐 目标表单: {}", url);
    info!("🔁 每条记录最多尝试 {} 次", max_attempts);
    info!("{}", "=".repeat(60));
}

/// 记录加载信息
pub fn log_records_loaded(total: usize, first: Option<&str>, last: Option<&str>) {
    info!("✓ 找到 {} 条待处理的记录", total);
    if let (Some(first), Some(last)) = (first, last) {
        info!("📋 处理范围: {} → {}", first, last);
    }
}

/// 打印最终统计信息
pub fn print_final_stats(report: &BatchReport, report_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.succeeded(), report.total);
    info!("❌ 放弃: {}", report.abandoned());
    if report.unprocessed() > 0 {
        info!("⏸️ 未处理: {}", report.unprocessed());
    }
    for outcome in report.abandoned_records() {
        let class = outcome
            .last_failure
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        info!("   - {} (最后失败: {}, 尝试 {} 次)", outcome.key, class, outcome.attempt_count);
    }
    if let Some(reason) = &report.aborted {
        info!("⛔ 批次提前终止: {}", reason);
    }
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", report_file);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
