//! 诊断写入服务 - 业务能力层
//!
//! 只负责保存失败现场，不关心流程。写入失败由调用方记录日志后忽略，
//! 不能覆盖正在诊断的原始错误。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::FileError;
use crate::models::DiagnosticEvent;

/// 诊断事件的接收端
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    /// 保存一次失败尝试的现场，返回可供报告引用的字符串
    async fn capture(
        &self,
        event: &DiagnosticEvent,
        snapshot: Option<&[u8]>,
    ) -> Result<String, FileError>;
}

/// 写入本地目录的诊断服务
///
/// - 截图保存为 `error-<时间>-<记录>-<阶段>-<尝试次数>.png`
/// - 每个事件追加一行到 `diagnostics.txt`
pub struct FileDiagnosticsSink {
    dir: PathBuf,
}

impl FileDiagnosticsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self) -> PathBuf {
        self.dir.join("diagnostics.txt")
    }

    fn snapshot_name(event: &DiagnosticEvent) -> String {
        format!(
            "error-{}-{}-{}-{}.png",
            event.timestamp.format("%Y%m%d-%H%M%S%.3f"),
            sanitize_key(&event.record_key),
            event.stage,
            event.attempt
        )
    }

    async fn append_line(&self, line: &str) -> Result<(), FileError> {
        let path = self.log_path();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FileError::write_failed(path.display().to_string(), e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| FileError::write_failed(path.display().to_string(), e))?;
        // 文件写入在阻塞线程池中完成，返回前必须落盘
        file.flush()
            .await
            .map_err(|e| FileError::write_failed(path.display().to_string(), e))
    }
}

#[async_trait]
impl DiagnosticsSink for FileDiagnosticsSink {
    async fn capture(
        &self,
        event: &DiagnosticEvent,
        snapshot: Option<&[u8]>,
    ) -> Result<String, FileError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FileError::write_failed(self.dir.display().to_string(), e))?;

        let reference = match snapshot {
            Some(bytes) => {
                let path = self.dir.join(Self::snapshot_name(event));
                fs::write(&path, bytes)
                    .await
                    .map_err(|e| FileError::write_failed(path.display().to_string(), e))?;
                path.display().to_string()
            }
            None => format!(
                "{}#{}/{}",
                self.log_path().display(),
                event.record_key,
                event.attempt
            ),
        };

        let line = format!(
            "{} | {} | 第 {} 次 | {} | {} | {} | {}\n",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.record_key,
            event.attempt,
            event.stage,
            event.failure,
            event.message.replace('\n', " "),
            reference
        );
        self.append_line(&line).await?;

        debug!("诊断已保存: {}", reference);
        Ok(reference)
    }
}

/// 记录键用于文件名时替换掉不安全的字符
fn sanitize_key(key: &str) -> String {
    key.replace('@', "_at_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// 测试用：保存在内存中的诊断
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: std::sync::Mutex<Vec<(DiagnosticEvent, bool)>>,
    pub fail: bool,
}

#[cfg(test)]
impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count_for(&self, key: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e.record_key == key)
            .count()
    }
}

#[cfg(test)]
#[async_trait]
impl DiagnosticsSink for MemorySink {
    async fn capture(
        &self,
        event: &DiagnosticEvent,
        snapshot: Option<&[u8]>,
    ) -> Result<String, FileError> {
        let mut events = self.events.lock().unwrap();
        events.push((event.clone(), snapshot.is_some()));
        if self.fail {
            return Err(FileError::write_failed(
                "memory",
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        Ok(format!("memory://{}/{}", event.record_key, events.len()))
    }
}
