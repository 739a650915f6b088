pub mod json_loader;
pub mod toml_loader;

use std::path::Path;

use crate::config::Config;
use crate::error::{AppError, ConfigError, FileError};
use crate::models::form_contract::FormContract;
use crate::models::record::Record;

pub use json_loader::load_json_records;
pub use toml_loader::load_toml_records;

/// 按扩展名加载记录文件，并补全默认字段
pub async fn load_records(
    path: &Path,
    contract: &FormContract,
    config: &Config,
) -> Result<Vec<Record>, AppError> {
    let raw = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => load_json_records(path).await?,
        Some("toml") => load_toml_records(path).await?,
        _ => {
            return Err(FileError::UnsupportedFormat {
                path: path.display().to_string(),
            }
            .into())
        }
    };

    let defaults = RecordDefaults::new(contract, config);
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(position, record)| defaults.apply(record, position))
        .collect())
}

/// 记录缺省字段的补全规则
///
/// 自由文本从备选池中按记录序号轮流选取，保证同样的输入得到同样的填写内容
#[derive(Debug, Clone)]
pub struct RecordDefaults {
    key_field: String,
    secondary: Option<(String, String)>,
    filler: Option<(String, Vec<String>)>,
}

impl RecordDefaults {
    pub fn new(contract: &FormContract, config: &Config) -> Self {
        Self {
            key_field: contract.key_field.clone(),
            secondary: contract
                .secondary_code_field
                .clone()
                .map(|field| (field, config.secondary_code.clone())),
            filler: contract
                .filler_field
                .clone()
                .map(|field| (field, config.filler_texts.clone())),
        }
    }

    /// 只补充记录中缺失的字段，已有字段保持不变
    pub fn apply(&self, record: Record, position: usize) -> Record {
        let mut record = record;
        if record.get(&self.key_field).is_none() {
            let key = record.key.clone();
            record = record.with_field(&self.key_field, key);
        }
        if let Some((field, code)) = &self.secondary {
            if record.get(field).is_none() {
                record = record.with_field(field, code.as_str());
            }
        }
        if let Some((field, pool)) = &self.filler {
            if record.get(field).is_none() {
                let text = if pool.is_empty() {
                    String::new()
                } else {
                    pool[position % pool.len()].clone()
                };
                record = record.with_field(field, text);
            }
        }
        record
    }
}

/// 截取起止记录之间（含两端）的记录；起止顺序可以颠倒
pub fn select_range(
    records: Vec<Record>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Vec<Record>, ConfigError> {
    if start.is_none() && end.is_none() {
        return Ok(records);
    }

    let position = |key: Option<&str>, fallback: usize| match key {
        Some(key) => records.iter().position(|r| r.key == key),
        None => Some(fallback),
    };
    let last = records.len().saturating_sub(1);
    let start_index = position(start, 0);
    let end_index = position(end, last);

    match (start_index, end_index) {
        (Some(a), Some(b)) if !records.is_empty() => {
            let (from, to) = (a.min(b), a.max(b));
            Ok(records.into_iter().skip(from).take(to - from + 1).collect())
        }
        _ => {
            let preview: Vec<&str> = records.iter().take(5).map(|r| r.key.as_str()).collect();
            Err(ConfigError::RangeKeyNotFound {
                start: start.unwrap_or("-").to_string(),
                end: end.unwrap_or("-").to_string(),
                start_found: start_index.is_some(),
                end_found: end_index.is_some(),
                preview: preview.join(", "),
            })
        }
    }
}
