//! 结果报告写入服务 - 业务能力层

use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::error::FileError;
use crate::models::BatchReport;

/// 报告文件：汇总计数 + 完整报告
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportFile<'a> {
    succeeded: usize,
    abandoned: usize,
    unprocessed: usize,
    #[serde(flatten)]
    report: &'a BatchReport,
}

/// 将批次报告保存为 JSON 文件
pub async fn save_report(report: &BatchReport, path: impl AsRef<Path>) -> Result<(), FileError> {
    let path = path.as_ref();
    let path_text = path.display().to_string();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileError::write_failed(&path_text, e))?;
    }

    let file = ReportFile {
        succeeded: report.succeeded(),
        abandoned: report.abandoned(),
        unprocessed: report.unprocessed(),
        report,
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| FileError::parse_failed(&path_text, e))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| FileError::write_failed(&path_text, e))?;

    info!("💾 结果报告已写入: {}", path_text);
    Ok(())
}
