//! AlarmEvent → AlarmRecord 映射。

use std::sync::Arc;

use async_trait::async_trait;
use domain::{AlarmRecord, format_alarm_time};

use crate::event::AlarmEvent;

/// 告警源名称 → 组织层级 ID 路径。
#[async_trait]
pub trait SourceLookup: Send + Sync {
    async fn resolve(&self, source_name: &str) -> String;
}

/// 不做解析，原样返回源名称。
#[derive(Debug, Clone, Default)]
pub struct IdentitySource;

#[async_trait]
impl SourceLookup for IdentitySource {
    async fn resolve(&self, source_name: &str) -> String {
        source_name.to_string()
    }
}

/// 严重度（1-1000）→ 优先级（1 最高，5 最低）。
pub fn severity_bucket(severity: Option<u16>) -> i32 {
    match severity.unwrap_or(0) {
        801.. => 1,
        601..=800 => 2,
        401..=600 => 3,
        201..=400 => 4,
        _ => 5,
    }
}

/// 当前值与增强字段拼成 `key=value` 列表。
pub fn property_description(event: &AlarmEvent) -> Option<String> {
    let mut pairs = Vec::with_capacity(event.values.len() + 1);
    if let Some(value) = &event.current_value {
        pairs.push(format!("Value={}", value));
    }
    pairs.extend(
        event
            .values
            .iter()
            .map(|(key, value)| format!("{}={}", key, value)),
    );
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

/// 记录映射器
#[derive(Clone)]
pub struct RecordMapper {
    source_system_id: String,
    sources: Arc<dyn SourceLookup>,
}

impl RecordMapper {
    pub fn new(source_system_id: impl Into<String>, sources: Arc<dyn SourceLookup>) -> Self {
        Self {
            source_system_id: source_system_id.into(),
            sources,
        }
    }

    pub async fn map(&self, event: &AlarmEvent) -> AlarmRecord {
        let source_name = event
            .source_name
            .clone()
            .unwrap_or_else(|| event.source_node.to_string());
        let source = self.sources.resolve(&source_name).await;
        let start_time = event
            .active_transition_time
            .or(event.time)
            .map(format_alarm_time);

        AlarmRecord {
            id: AlarmRecord::stable_id(&event.event_id_hex),
            source_alarm_id: event.event_id_hex.clone(),
            priority_id: severity_bucket(event.severity),
            start_time,
            end_time: None,
            source,
            source_property: event.source_node.to_string(),
            alarm_type: event.event_type_description.clone(),
            alert_name: event
                .active_display_name
                .clone()
                .or_else(|| event.source_name.clone()),
            property_description: property_description(event),
            source_system_id: self.source_system_id.clone(),
            message: event.message.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_to_five_buckets() {
        assert_eq!(severity_bucket(Some(1000)), 1);
        assert_eq!(severity_bucket(Some(801)), 1);
        assert_eq!(severity_bucket(Some(800)), 2);
        assert_eq!(severity_bucket(Some(500)), 3);
        assert_eq!(severity_bucket(Some(201)), 4);
        assert_eq!(severity_bucket(Some(200)), 5);
        assert_eq!(severity_bucket(None), 5);
    }
}
