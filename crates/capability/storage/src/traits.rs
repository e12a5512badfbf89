//! 暂存队列接口
//!
//! 持久化粒度是（API 名称, AlarmRecord）：每个 API 一个目录，每条未投递记录一个文件。
//! - `store`：不存在才写入（同一记录至多一份）
//! - `delete`：幂等，不存在时返回 `false`
//! - `list`：列出某个 API 下的全部暂存记录

use async_trait::async_trait;
use domain::AlarmRecord;
use uuid::Uuid;

use crate::error::StorageError;

/// 写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    AlreadyPresent,
}

/// 告警记录暂存接口
#[async_trait]
pub trait AlarmStorage: Send + Sync {
    async fn list(&self, api_name: &str) -> Result<Vec<AlarmRecord>, StorageError>;

    async fn store(
        &self,
        api_name: &str,
        record: &AlarmRecord,
    ) -> Result<StoreOutcome, StorageError>;

    async fn delete(&self, api_name: &str, record_id: Uuid) -> Result<bool, StorageError>;
}

/// 记录文件名：`ALM_<id>.json`。
pub fn record_file_name(record_id: Uuid) -> String {
    format!("ALM_{}.json", record_id)
}
