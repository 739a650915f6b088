use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use crate::error::FileError;
use crate::models::record::Record;

/// JSON 中的记录可以只是标识字符串，也可以是完整对象
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Key(String),
    Full(Record),
}

/// 从 JSON 数组加载记录
pub async fn load_json_records(path: &Path) -> Result<Vec<Record>, FileError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| FileError::read_failed(&display, e))?;

    let raw: Vec<RawRecord> =
        serde_json::from_str(&content).map_err(|e| FileError::parse_failed(&display, e))?;

    let records: Vec<Record> = raw
        .into_iter()
        .map(|r| match r {
            RawRecord::Key(key) => Record::new(key.trim()),
            RawRecord::Full(record) => record,
        })
        .filter(|r| !r.key.is_empty())
        .collect();

    tracing::info!(
        "成功加载 {} 条记录: {}",
        records.len(),
        path.file_name().unwrap_or_default().to_string_lossy()
    );
    Ok(records)
}
