//! 模拟地址空间（`GW_OPCUA_SIMULATED=true`）。
//!
//! 一个带 Level/Temperature 字段的储罐类型、一个实例和一个高液位条件，
//! 模拟器按固定间隔推送告警事件。

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use gw_protocol::{LocalizedText, MemoryNode, MemoryServer, NodeId, Variant, ids};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const NAMESPACE: u16 = 2;

pub fn tank_type() -> NodeId {
    NodeId::string(NAMESPACE, "TankType")
}

pub fn tank() -> NodeId {
    NodeId::string(NAMESPACE, "Tank1")
}

pub fn level() -> NodeId {
    NodeId::string(NAMESPACE, "Tank1.Level")
}

pub fn high_level_condition() -> NodeId {
    NodeId::string(NAMESPACE, "Tank1.HighLevel")
}

/// 构建模拟工厂地址空间。
pub fn plant() -> MemoryServer {
    let server = MemoryServer::new();
    server.add_node(MemoryNode::object_type(ids::ALARM_CONDITION_TYPE, "AlarmConditionType"));
    server.add_node(MemoryNode::object_type(ids::BASE_OBJECT_TYPE, "BaseObjectType"));

    server.add_object_type(MemoryNode::object_type(tank_type(), "TankType"), Some(&ids::BASE_OBJECT_TYPE));
    server.add_field(
        &tank_type(),
        MemoryNode::variable(NodeId::string(NAMESPACE, "TankType.Level"), "Level", Variant::Empty)
            .with_description("Fill level")
            .with_data_type(NodeId::numeric(0, 11)),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    server.add_field(
        &tank_type(),
        MemoryNode::variable(
            NodeId::string(NAMESPACE, "TankType.Temperature"),
            "Temperature",
            Variant::Empty,
        )
        .with_data_type(NodeId::numeric(0, 11)),
        Some(ids::MODELLING_RULE_OPTIONAL),
    );

    server.add_node(MemoryNode::object(tank(), "Tank1"));
    server.add_reference(&tank(), ids::HAS_TYPE_DEFINITION, &tank_type());
    server.add_field(
        &tank(),
        MemoryNode::variable(level(), "Level", Variant::Double(42.0)).with_data_type(NodeId::numeric(0, 11)),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    server.add_field(
        &tank(),
        MemoryNode::variable(
            NodeId::string(NAMESPACE, "Tank1.Temperature"),
            "Temperature",
            Variant::Double(18.5),
        )
        .with_data_type(NodeId::numeric(0, 11)),
        Some(ids::MODELLING_RULE_OPTIONAL),
    );
    server.add_node(MemoryNode::object(high_level_condition(), "HighLevel"));
    server
}

/// 第 `sequence` 个模拟告警事件的字段值。
pub fn high_level_event(sequence: u64) -> HashMap<String, Variant> {
    let now = Utc::now();
    HashMap::from([
        ("EventId".to_string(), Variant::ByteString(sequence.to_be_bytes().to_vec())),
        ("EventType".to_string(), Variant::NodeId(ids::ALARM_CONDITION_TYPE)),
        ("SourceNode".to_string(), Variant::NodeId(tank())),
        ("SourceName".to_string(), Variant::String("Tank1".to_string())),
        ("Time".to_string(), Variant::DateTime(now)),
        ("Message".to_string(), Variant::LocalizedText(LocalizedText::new("Level high"))),
        ("Severity".to_string(), Variant::UInt16(700)),
        ("ConditionId".to_string(), Variant::NodeId(high_level_condition())),
        ("ActiveState/Id".to_string(), Variant::Boolean(true)),
        ("ActiveState".to_string(), Variant::LocalizedText(LocalizedText::new("Active"))),
        ("ActiveState/TransitionTime".to_string(), Variant::DateTime(now)),
        (
            "ActiveState/EffectiveDisplayName".to_string(),
            Variant::LocalizedText(LocalizedText::new("HighLevel")),
        ),
    ])
}

/// 按间隔推送模拟告警，直到取消。
pub async fn run_simulator(server: MemoryServer, interval: Duration, cancel: CancellationToken) {
    let mut sequence = 0u64;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        sequence += 1;
        let delivered = server.emit_event(&high_level_event(sequence));
        debug!(target: "gw.app", sequence, delivered, "simulated_alarm_emitted");
    }
}
