//! 存储转发队列：立即发送，失败落盘，成功删盘。
//!
//! 同一（API, 记录 ID）同一时刻只允许一个发送流程；
//! 落盘是“不存在才写”，删除是幂等的，因此重复调用不会产生重复文件。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use domain::{AlarmRecord, WebApi};
use gw_storage::{AlarmStorage, StoreOutcome};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::retry::{RetryPolicy, send_with_retry};
use crate::transport::AlarmTransport;

/// 一批记录对某个 API 的投递结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub api_name: String,
    pub attempted: usize,
    pub delivered: usize,
    pub stored: usize,
    pub retries: usize,
}

/// 下游投递队列
pub struct DeliveryQueue {
    transport: Arc<dyn AlarmTransport>,
    storage: Arc<dyn AlarmStorage>,
    retry: RetryPolicy,
    apis: Vec<WebApi>,
    in_flight: Mutex<HashSet<(String, Uuid)>>,
}

struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<(String, Uuid)>>,
    key: (String, Uuid),
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

impl DeliveryQueue {
    pub fn new(
        transport: Arc<dyn AlarmTransport>,
        storage: Arc<dyn AlarmStorage>,
        retry: RetryPolicy,
        apis: Vec<WebApi>,
    ) -> Self {
        Self {
            transport,
            storage,
            retry,
            apis,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn apis(&self) -> &[WebApi] {
        &self.apis
    }

    pub fn find_api(&self, name: &str) -> Option<&WebApi> {
        self.apis.iter().find(|api| api.name == name)
    }

    /// 定义了新增告警路由的 API
    pub fn alarm_apis(&self) -> impl Iterator<Item = &WebApi> {
        self.apis.iter().filter(|api| api.add_alarm_url().is_some())
    }

    /// 把新产生的记录投递到所有配置了新增路由的 API。
    pub async fn publish_to_all(&self, records: &[AlarmRecord]) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();
        for api in self.alarm_apis() {
            outcomes.push(self.handle_raised(api, records).await);
        }
        outcomes
    }

    /// 逐条发送；成功删除磁盘副本，失败写入磁盘（已存在则跳过）。
    pub async fn handle_raised(&self, api: &WebApi, records: &[AlarmRecord]) -> DeliveryOutcome {
        let mut outcome = DeliveryOutcome {
            api_name: api.name.clone(),
            ..DeliveryOutcome::default()
        };
        for record in records {
            let Some(_guard) = self.claim(&api.name, record.id) else {
                debug!(target: "gw.delivery", api = %api.name, alarm_id = %record.id, "delivery_in_flight_skipped");
                continue;
            };
            outcome.attempted += 1;
            let report = send_with_retry(self.transport.as_ref(), &self.retry, api, record).await;
            outcome.retries += report.retry_delays.len();
            match report.result {
                Ok(()) => {
                    outcome.delivered += 1;
                    gw_telemetry::record_delivery_success();
                    info!(
                        target: "gw.delivery",
                        api = %api.name,
                        alarm_id = %record.id,
                        retries = report.retry_delays.len(),
                        "alarm_delivered"
                    );
                    self.remove_stored(&api.name, record.id).await;
                }
                Err(err) => {
                    gw_telemetry::record_delivery_failure();
                    warn!(target: "gw.delivery", api = %api.name, alarm_id = %record.id, error = %err, "alarm_delivery_failed");
                    if self.persist(&api.name, record).await {
                        outcome.stored += 1;
                    }
                }
            }
        }
        outcome
    }

    /// 重投某个 API 下的全部暂存记录。
    pub async fn send_stored_items(&self, api_name: &str) -> Result<DeliveryOutcome, DeliveryError> {
        let api = self
            .find_api(api_name)
            .ok_or_else(|| DeliveryError::UnknownApi(api_name.to_string()))?;
        if api.add_alarm_url().is_none() {
            return Err(DeliveryError::NoAddRoute(api_name.to_string()));
        }
        let records = self.storage.list(&api.name).await?;
        if records.is_empty() {
            return Ok(DeliveryOutcome {
                api_name: api.name.clone(),
                ..DeliveryOutcome::default()
            });
        }
        info!(target: "gw.delivery", api = %api.name, count = records.len(), "stored_alarms_resend");
        Ok(self.handle_raised(api, &records).await)
    }

    /// 所有 API 的暂存重投；单个 API 失败不影响其余 API。
    pub async fn send_all_stored(&self) -> (Vec<DeliveryOutcome>, Vec<DeliveryError>) {
        let names: Vec<String> = self.alarm_apis().map(|api| api.name.clone()).collect();
        let mut outcomes = Vec::new();
        let mut errors = Vec::new();
        for name in names {
            match self.send_stored_items(&name).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(target: "gw.delivery", api = %name, error = %err, "stored_alarms_list_failed");
                    errors.push(err);
                }
            }
        }
        (outcomes, errors)
    }

    fn claim(&self, api_name: &str, record_id: Uuid) -> Option<InFlightGuard<'_>> {
        let key = (api_name.to_string(), record_id);
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            key,
        })
    }

    async fn remove_stored(&self, api_name: &str, record_id: Uuid) {
        match self.storage.delete(api_name, record_id).await {
            Ok(true) => {
                gw_telemetry::record_record_deleted();
                info!(target: "gw.delivery", api = %api_name, alarm_id = %record_id, "stored_alarm_removed");
            }
            Ok(false) => {}
            Err(err) => {
                warn!(target: "gw.delivery", api = %api_name, alarm_id = %record_id, error = %err, "stored_alarm_remove_failed");
            }
        }
    }

    async fn persist(&self, api_name: &str, record: &AlarmRecord) -> bool {
        match self.storage.store(api_name, record).await {
            Ok(StoreOutcome::Stored) => {
                gw_telemetry::record_record_stored();
                info!(target: "gw.delivery", api = %api_name, alarm_id = %record.id, "alarm_persisted");
                true
            }
            Ok(StoreOutcome::AlreadyPresent) => {
                debug!(target: "gw.delivery", api = %api_name, alarm_id = %record.id, "alarm_already_persisted");
                false
            }
            Err(err) => {
                gw_telemetry::record_storage_failure();
                error!(
                    target: "gw.delivery",
                    api = %api_name,
                    alarm_id = %record.id,
                    error = %err,
                    "alarm_persist_failed"
                );
                false
            }
        }
    }
}
