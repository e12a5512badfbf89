//! 告警事件订阅。
//!
//! 事件过滤器的 select 子句是协议契约，不可配置：
//! 7 个基础事件字段 + 确认/激活相关的告警字段。
//! 订阅归属于会话，会话代数变化（新握手或重连）后整体重建。

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::client::{MonitoredItemSettings, MonitoringMode, NotificationSink, SubscriptionSettings};
use crate::error::ProtocolError;
use crate::ids;
use crate::session::ProtocolSession;
use crate::types::{AttributeId, CallMethodRequest, EventFilter, SimpleAttributeOperand, Variant};

/// 事件字段名
pub mod fields {
    pub const EVENT_ID: &str = "EventId";
    pub const EVENT_TYPE: &str = "EventType";
    pub const SOURCE_NODE: &str = "SourceNode";
    pub const SOURCE_NAME: &str = "SourceName";
    pub const TIME: &str = "Time";
    pub const MESSAGE: &str = "Message";
    pub const SEVERITY: &str = "Severity";
    pub const ACKED_STATE: &str = "AckedState";
    /// NodeId 属性子句没有浏览路径，以此名称代替。
    pub const CONDITION_ID: &str = "ConditionId";
    pub const ACTIVE_STATE_ID: &str = "ActiveState/Id";
    pub const ACTIVE_STATE: &str = "ActiveState";
    pub const ACTIVE_STATE_TRANSITION_TIME: &str = "ActiveState/TransitionTime";
    pub const ACTIVE_STATE_EFFECTIVE_DISPLAY_NAME: &str = "ActiveState/EffectiveDisplayName";
}

/// 告警事件过滤器（固定 select 子句）。
pub fn alarm_event_filter() -> EventFilter {
    let base = [
        fields::EVENT_ID,
        fields::EVENT_TYPE,
        fields::SOURCE_NODE,
        fields::SOURCE_NAME,
        fields::TIME,
        fields::MESSAGE,
        fields::SEVERITY,
    ];
    let mut select_clauses: Vec<SimpleAttributeOperand> = base
        .iter()
        .map(|field| SimpleAttributeOperand::value(ids::BASE_EVENT_TYPE, field))
        .collect();

    select_clauses.push(SimpleAttributeOperand::value(
        ids::ACKNOWLEDGEABLE_CONDITION_TYPE,
        fields::ACKED_STATE,
    ));
    select_clauses.push(SimpleAttributeOperand::node_id(
        ids::ACKNOWLEDGEABLE_CONDITION_TYPE,
    ));
    for field in [
        fields::ACTIVE_STATE_ID,
        fields::ACTIVE_STATE,
        fields::ACTIVE_STATE_TRANSITION_TIME,
        fields::ACTIVE_STATE_EFFECTIVE_DISPLAY_NAME,
    ] {
        select_clauses.push(SimpleAttributeOperand::value(
            ids::ALARM_CONDITION_TYPE,
            field,
        ));
    }
    EventFilter { select_clauses }
}

/// select 子句对应的字段名（空路径即 `ConditionId`）。
pub fn field_name(clause: &SimpleAttributeOperand) -> String {
    let path = clause.path_text();
    if path.trim().is_empty() {
        fields::CONDITION_ID.to_string()
    } else {
        path
    }
}

/// Server 对象上的事件监控项参数。
pub fn server_event_item() -> MonitoredItemSettings {
    MonitoredItemSettings {
        start_node_id: ids::SERVER,
        attribute_id: AttributeId::EventNotifier,
        monitoring_mode: MonitoringMode::Reporting,
        sampling_interval_ms: 0,
        queue_size: 0,
        discard_oldest: true,
        filter: alarm_event_filter(),
    }
}

#[derive(Debug, Clone, Default)]
struct CreatedSubscriptions {
    generation: u64,
    subscription_ids: Vec<u32>,
}

/// 按配置名称创建订阅，并在会话更替后重建。
pub struct SubscriptionManager {
    names: Vec<String>,
    created: Mutex<Option<CreatedSubscriptions>>,
}

impl SubscriptionManager {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            created: Mutex::new(None),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 当前会话代数下的订阅 ID。
    pub fn subscription_ids(&self, generation: u64) -> Vec<u32> {
        self.snapshot()
            .filter(|created| created.generation == generation)
            .map(|created| created.subscription_ids)
            .unwrap_or_default()
    }

    /// 确保当前会话上已建立订阅；返回本次是否新建。
    pub async fn ensure(
        &self,
        session: &ProtocolSession,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<bool, ProtocolError> {
        let (ua, generation) = session
            .current_with_generation()
            .ok_or(ProtocolError::NotConnected)?;
        if self
            .snapshot()
            .map(|created| created.generation == generation)
            .unwrap_or(false)
        {
            return Ok(false);
        }

        let item = server_event_item();
        let mut subscription_ids = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let subscription_id = ua
                .create_subscription(&SubscriptionSettings::named(name.clone()))
                .await?;
            let monitored_item_id = ua
                .create_event_monitored_item(subscription_id, &item, sink.clone())
                .await?;
            info!(
                target: "gw.protocol",
                subscription = %name,
                subscription_id,
                monitored_item_id,
                generation,
                "subscription_created"
            );
            subscription_ids.push(subscription_id);
        }

        let mut created = self
            .created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *created = Some(CreatedSubscriptions {
            generation,
            subscription_ids,
        });
        Ok(true)
    }

    /// 对当前会话上的订阅请求 ConditionRefresh（服务器重发所有活动条件）。
    pub async fn condition_refresh(&self, session: &ProtocolSession) -> Result<usize, ProtocolError> {
        let (ua, generation) = session
            .current_with_generation()
            .ok_or(ProtocolError::NotConnected)?;
        let requests: Vec<CallMethodRequest> = self
            .subscription_ids(generation)
            .into_iter()
            .map(|subscription_id| CallMethodRequest {
                object_id: ids::CONDITION_TYPE,
                method_id: ids::CONDITION_TYPE_CONDITION_REFRESH,
                input_arguments: vec![Variant::UInt32(subscription_id)],
            })
            .collect();
        if requests.is_empty() {
            return Ok(0);
        }
        let results = ua.call(&requests).await?;
        let refreshed = results
            .iter()
            .filter(|result| result.status.is_good())
            .count();
        if refreshed != requests.len() {
            warn!(
                target: "gw.protocol",
                requested = requests.len(),
                refreshed,
                "condition_refresh_partial"
            );
        }
        Ok(refreshed)
    }

    fn snapshot(&self) -> Option<CreatedSubscriptions> {
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_has_fixed_clause_set() {
        let filter = alarm_event_filter();
        let names: Vec<String> = filter.select_clauses.iter().map(field_name).collect();
        assert_eq!(
            names,
            vec![
                "EventId",
                "EventType",
                "SourceNode",
                "SourceName",
                "Time",
                "Message",
                "Severity",
                "AckedState",
                "ConditionId",
                "ActiveState/Id",
                "ActiveState",
                "ActiveState/TransitionTime",
                "ActiveState/EffectiveDisplayName",
            ]
        );
        assert_eq!(filter.select_clauses[8].attribute_id, AttributeId::NodeId);
    }
}
