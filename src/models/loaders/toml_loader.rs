use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use crate::error::FileError;
use crate::models::record::Record;

/// TOML 记录文件：`keys` 列表与 `[[records]]` 表可以同时出现，`keys` 在前
#[derive(Debug, Default, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    records: Vec<Record>,
}

/// 从 TOML 文件加载记录
pub async fn load_toml_records(path: &Path) -> Result<Vec<Record>, FileError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| FileError::read_failed(&display, e))?;

    let file: RecordsFile =
        toml::from_str(&content).map_err(|e| FileError::parse_failed(&display, e))?;

    let records: Vec<Record> = file
        .keys
        .into_iter()
        .map(|k| Record::new(k.trim()))
        .chain(file.records)
        .filter(|r| !r.key.is_empty())
        .collect();

    tracing::info!(
        "成功加载 {} 条记录: {}",
        records.len(),
        path.file_name().unwrap_or_default().to_string_lossy()
    );
    Ok(records)
}
