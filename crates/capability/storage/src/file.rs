//! 文件系统暂存实现
//!
//! 目录布局：`{root}/{api_name}/ALM_{id}.json`，内容为记录的传输 JSON。
//!
//! 写入先落到同目录下的临时文件，再以硬链接方式发布到最终文件名：
//! 硬链接在目标已存在时失败，因此“不存在才写入”与“完整内容可见”同时成立，
//! 同一记录的并发写入者不会看到或产生半截文件。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domain::AlarmRecord;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StorageError;
use crate::traits::{AlarmStorage, StoreOutcome, record_file_name};
use crate::validation::ensure_api_name;

const RECORD_PREFIX: &str = "ALM_";
const RECORD_SUFFIX: &str = ".json";

/// 文件系统暂存
#[derive(Debug, Clone)]
pub struct FileAlarmStorage {
    root: PathBuf,
}

impl FileAlarmStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn api_dir(&self, api_name: &str) -> Result<PathBuf, StorageError> {
        ensure_api_name(api_name)?;
        Ok(self.root.join(api_name))
    }

    /// 记录的确定性文件路径。
    pub fn record_path(&self, api_name: &str, record_id: Uuid) -> Result<PathBuf, StorageError> {
        Ok(self.api_dir(api_name)?.join(record_file_name(record_id)))
    }
}

#[async_trait]
impl AlarmStorage for FileAlarmStorage {
    async fn list(&self, api_name: &str) -> Result<Vec<AlarmRecord>, StorageError> {
        let dir = self.api_dir(api_name)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(RECORD_PREFIX) && name.ends_with(RECORD_SUFFIX) {
                files.push((name, entry.path()));
            }
        }
        files.sort();

        let mut records = Vec::with_capacity(files.len());
        for (name, path) in files {
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                // 读取期间被其他投递删除
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            match serde_json::from_slice::<AlarmRecord>(&content) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(
                        target: "gw.storage",
                        api = %api_name,
                        file = %name,
                        error = %err,
                        "stored_record_unreadable"
                    );
                }
            }
        }
        Ok(records)
    }

    async fn store(
        &self,
        api_name: &str,
        record: &AlarmRecord,
    ) -> Result<StoreOutcome, StorageError> {
        let dir = self.api_dir(api_name)?;
        let path = dir.join(record_file_name(record.id));
        if tokio::fs::try_exists(&path).await? {
            return Ok(StoreOutcome::AlreadyPresent);
        }
        tokio::fs::create_dir_all(&dir).await?;

        let content = serde_json::to_vec(record)?;
        let temp = dir.join(format!(".{}.{}.tmp", record.id, Uuid::new_v4().simple()));
        tokio::fs::write(&temp, &content).await?;
        let published = tokio::fs::hard_link(&temp, &path).await;
        if let Err(err) = tokio::fs::remove_file(&temp).await {
            debug!(target: "gw.storage", file = %temp.display(), error = %err, "temp_cleanup_failed");
        }
        match published {
            Ok(()) => {
                debug!(target: "gw.storage", api = %api_name, alarm_id = %record.id, "alarm_persisted");
                Ok(StoreOutcome::Stored)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(StoreOutcome::AlreadyPresent),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, api_name: &str, record_id: Uuid) -> Result<bool, StorageError> {
        let path = self.record_path(api_name, record_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(target: "gw.storage", api = %api_name, alarm_id = %record_id, "alarm_file_deleted");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
