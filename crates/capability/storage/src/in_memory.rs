//! 暂存队列内存实现
//!
//! 仅用于测试和无磁盘演示。

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use domain::AlarmRecord;
use uuid::Uuid;

use crate::error::StorageError;
use crate::traits::{AlarmStorage, StoreOutcome};
use crate::validation::ensure_api_name;

/// 内存暂存
#[derive(Debug, Default)]
pub struct InMemoryAlarmStorage {
    records: RwLock<BTreeMap<(String, Uuid), AlarmRecord>>,
}

impl InMemoryAlarmStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 暂存记录总数（用于测试）
    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AlarmStorage for InMemoryAlarmStorage {
    async fn list(&self, api_name: &str) -> Result<Vec<AlarmRecord>, StorageError> {
        ensure_api_name(api_name)?;
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(records
            .iter()
            .filter(|((api, _), _)| api == api_name)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn store(
        &self,
        api_name: &str,
        record: &AlarmRecord,
    ) -> Result<StoreOutcome, StorageError> {
        ensure_api_name(api_name)?;
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let key = (api_name.to_string(), record.id);
        if records.contains_key(&key) {
            return Ok(StoreOutcome::AlreadyPresent);
        }
        records.insert(key, record.clone());
        Ok(StoreOutcome::Stored)
    }

    async fn delete(&self, api_name: &str, record_id: Uuid) -> Result<bool, StorageError> {
        ensure_api_name(api_name)?;
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(records.remove(&(api_name.to_string(), record_id)).is_some())
    }
}
