//! 事件通知解码。
//!
//! select 子句与通知字段按下标一一对应；先按字段名建表，再取出必填字段。
//! `EventId`、`EventType`、`SourceNode`、`ConditionId` 缺一即解码失败。

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use gw_protocol::subscription::fields;
use gw_protocol::{EventFilter, EventNotification, NodeId, Variant, field_name};

use crate::error::DecodeError;

/// 解码后的告警事件，增强阶段补充类型描述、当前值和字段值。
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmEvent {
    pub event_id: Vec<u8>,
    /// EventId 的大写十六进制
    pub event_id_hex: String,
    pub event_type: NodeId,
    pub source_node: NodeId,
    pub source_name: Option<String>,
    pub condition_id: NodeId,
    pub time: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub severity: Option<u16>,
    pub acked_state: Option<String>,
    pub active: Option<bool>,
    pub active_state: Option<String>,
    pub active_transition_time: Option<DateTime<Utc>>,
    pub active_display_name: Option<String>,
    pub event_type_description: Option<String>,
    pub current_value: Option<Variant>,
    /// 增强字段：节点 ID 末段 → 值
    pub values: BTreeMap<String, Variant>,
}

/// select 子句的字段名列表（与通知字段下标对应）。
pub fn field_names(filter: &EventFilter) -> Vec<String> {
    filter.select_clauses.iter().map(field_name).collect()
}

/// 通知字段按名称建表；空值不入表。
pub fn field_map(names: &[String], notification: &EventNotification) -> HashMap<String, Variant> {
    names
        .iter()
        .zip(notification.fields.iter())
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// 解码一条通知。
pub fn decode(names: &[String], notification: &EventNotification) -> Result<AlarmEvent, DecodeError> {
    let map = field_map(names, notification);

    let event_id = required(&map, fields::EVENT_ID)?
        .as_byte_string()
        .filter(|bytes| !bytes.is_empty())
        .ok_or(DecodeError::InvalidField {
            field: fields::EVENT_ID,
            expected: "ByteString",
        })?
        .to_vec();
    let event_type = required_node_id(&map, fields::EVENT_TYPE)?;
    let source_node = required_node_id(&map, fields::SOURCE_NODE)?;
    let condition_id = required_node_id(&map, fields::CONDITION_ID)?;

    let text = |name: &str| map.get(name).and_then(Variant::as_text).map(str::to_string);
    let time = |name: &str| map.get(name).and_then(Variant::as_date_time);

    Ok(AlarmEvent {
        event_id_hex: hex::encode_upper(&event_id),
        event_id,
        event_type,
        source_node,
        source_name: text(fields::SOURCE_NAME),
        condition_id,
        time: time(fields::TIME),
        message: text(fields::MESSAGE),
        severity: map
            .get(fields::SEVERITY)
            .and_then(Variant::as_i64)
            .and_then(|value| u16::try_from(value).ok()),
        acked_state: text(fields::ACKED_STATE),
        active: match map.get(fields::ACTIVE_STATE_ID) {
            Some(Variant::Boolean(value)) => Some(*value),
            _ => None,
        },
        active_state: text(fields::ACTIVE_STATE),
        active_transition_time: time(fields::ACTIVE_STATE_TRANSITION_TIME),
        active_display_name: text(fields::ACTIVE_STATE_EFFECTIVE_DISPLAY_NAME),
        event_type_description: None,
        current_value: None,
        values: BTreeMap::new(),
    })
}

fn required<'a>(
    map: &'a HashMap<String, Variant>,
    field: &'static str,
) -> Result<&'a Variant, DecodeError> {
    map.get(field).ok_or(DecodeError::MissingField(field))
}

fn required_node_id(
    map: &HashMap<String, Variant>,
    field: &'static str,
) -> Result<NodeId, DecodeError> {
    required(map, field)?
        .as_node_id()
        .filter(|node_id| !node_id.is_null())
        .cloned()
        .ok_or(DecodeError::InvalidField {
            field,
            expected: "NodeId",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_protocol::{LocalizedText, alarm_event_filter};

    fn notification(values: &[(&str, Variant)]) -> EventNotification {
        let names = field_names(&alarm_event_filter());
        let fields = names
            .iter()
            .map(|name| {
                values
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_default()
            })
            .collect();
        EventNotification {
            subscription_id: 1,
            monitored_item_id: 1,
            fields,
        }
    }

    fn required_fields() -> Vec<(&'static str, Variant)> {
        vec![
            ("EventId", Variant::ByteString(vec![0x0A, 0xFF])),
            ("EventType", Variant::NodeId(NodeId::numeric(0, 2915))),
            ("SourceNode", Variant::NodeId(NodeId::string(2, "Tank1.Level"))),
            ("ConditionId", Variant::NodeId(NodeId::string(2, "Tank1.HighLevel"))),
        ]
    }

    #[test]
    fn decodes_required_and_optional_fields() {
        let mut values = required_fields();
        values.push(("Severity", Variant::UInt16(650)));
        values.push(("Message", Variant::LocalizedText(LocalizedText::new("Level high"))));
        values.push(("ActiveState/Id", Variant::Boolean(true)));
        let names = field_names(&alarm_event_filter());

        let event = decode(&names, &notification(&values)).expect("decoded");
        assert_eq!(event.event_id_hex, "0AFF");
        assert_eq!(event.severity, Some(650));
        assert_eq!(event.message.as_deref(), Some("Level high"));
        assert_eq!(event.active, Some(true));
        assert!(event.source_name.is_none());
    }

    #[test]
    fn each_required_field_is_checked() {
        let names = field_names(&alarm_event_filter());
        for missing in ["EventId", "EventType", "SourceNode", "ConditionId"] {
            let values: Vec<(&str, Variant)> = required_fields()
                .into_iter()
                .filter(|(name, _)| *name != missing)
                .collect();
            let err = decode(&names, &notification(&values)).expect_err("missing");
            assert!(matches!(err, DecodeError::MissingField(field) if field == missing));
        }
    }

    #[test]
    fn wrong_type_is_rejected() {
        let names = field_names(&alarm_event_filter());
        let mut values = required_fields();
        values[0] = ("EventId", Variant::String("E1".to_string()));
        let err = decode(&names, &notification(&values)).expect_err("invalid");
        assert_eq!(
            err,
            DecodeError::InvalidField {
                field: "EventId",
                expected: "ByteString"
            }
        );
    }
}
