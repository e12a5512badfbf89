use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain::AlarmRecord;
use gw_pipeline::{
    AlarmRecordSink, DecodeError, Enricher, EventPipeline, IdentitySource, PipelineConfig,
    PipelineError, RecordMapper, field_names,
};
use gw_protocol::{
    DefaultCertificatePolicy, EventNotification, NotificationSink, LocalizedText, MemoryNode, MemoryServer, NodeId,
    ProtocolSession, SessionConfig, SubscriptionManager, TypeBrowser, Variant, alarm_event_filter,
    ids,
};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<AlarmRecord>>,
}

impl CollectingSink {
    fn records(&self) -> Vec<AlarmRecord> {
        self.records.lock().expect("lock").clone()
    }

    /// 记录在独立任务中交付，等待其到达。
    async fn wait_for(&self, count: usize) -> Vec<AlarmRecord> {
        for _ in 0..50 {
            if self.records().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.records()
    }
}

#[async_trait]
impl AlarmRecordSink for CollectingSink {
    async fn publish(&self, records: Vec<AlarmRecord>) {
        self.records.lock().expect("lock").extend(records);
    }
}

fn tank() -> NodeId {
    NodeId::string(2, "Tank1")
}

fn condition() -> NodeId {
    NodeId::string(2, "Tank1.HighLevel")
}

fn plant() -> MemoryServer {
    let server = MemoryServer::new();
    server.add_node(MemoryNode::object_type(
        ids::ALARM_CONDITION_TYPE,
        "AlarmConditionType",
    ));
    server.add_node(MemoryNode::object(tank(), "Tank1"));
    server.add_field(
        &tank(),
        MemoryNode::variable(NodeId::string(2, "Tank1.Level"), "Level", Variant::Double(3.5)),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    server.add_field(
        &tank(),
        MemoryNode::variable(
            NodeId::string(2, "Tank1.Temperature"),
            "Temperature",
            Variant::Double(21.0),
        ),
        Some(ids::MODELLING_RULE_OPTIONAL),
    );
    server.add_node(MemoryNode::object(condition(), "HighLevel"));
    server
}

fn event_values() -> HashMap<String, Variant> {
    let activated = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("time");
    HashMap::from([
        ("EventId".to_string(), Variant::ByteString(vec![0xE1, 0x0a])),
        ("EventType".to_string(), Variant::NodeId(ids::ALARM_CONDITION_TYPE)),
        ("SourceNode".to_string(), Variant::NodeId(tank())),
        ("SourceName".to_string(), Variant::String("Tank1".to_string())),
        ("ConditionId".to_string(), Variant::NodeId(condition())),
        ("Severity".to_string(), Variant::UInt16(500)),
        (
            "Message".to_string(),
            Variant::LocalizedText(LocalizedText::new("Level high")),
        ),
        ("ActiveState/Id".to_string(), Variant::Boolean(true)),
        ("ActiveState/TransitionTime".to_string(), Variant::DateTime(activated)),
    ])
}

fn notification(values: &HashMap<String, Variant>) -> EventNotification {
    let fields = field_names(&alarm_event_filter())
        .iter()
        .map(|name| values.get(name).cloned().unwrap_or_default())
        .collect();
    EventNotification {
        subscription_id: 1,
        monitored_item_id: 1,
        fields,
    }
}

async fn connected(server: &MemoryServer) -> Arc<ProtocolSession> {
    let session = ProtocolSession::new(
        Arc::new(server.clone()),
        SessionConfig::new("opc.tcp://memory:4840"),
        Arc::new(DefaultCertificatePolicy::new(false)),
    );
    assert!(session.connect().await);
    session
}

fn pipeline(session: Arc<ProtocolSession>, sink: Arc<CollectingSink>) -> EventPipeline {
    EventPipeline::new(
        session,
        Enricher::new(
            TypeBrowser::default(),
            vec!["Level".to_string(), "Pressure".to_string()],
        ),
        RecordMapper::new("plant-a", Arc::new(IdentitySource)),
        sink,
        PipelineConfig::default(),
    )
}

#[tokio::test]
async fn valid_notification_produces_one_enriched_record() {
    let server = plant();
    let sink = Arc::new(CollectingSink::default());
    let pipeline = pipeline(connected(&server).await, sink.clone());

    let record = pipeline
        .handle(notification(&event_values()))
        .await
        .expect("record");

    assert_eq!(sink.wait_for(1).await, vec![record.clone()]);
    assert_eq!(record.source_alarm_id, "E10A");
    assert_eq!(record.id, AlarmRecord::stable_id("E10A"));
    assert_eq!(record.priority_id, 3);
    assert_eq!(record.start_time.as_deref(), Some("2026-01-02T03:04:05.000Z"));
    assert_eq!(record.source, "Tank1");
    assert_eq!(record.source_property, "ns=2;s=Tank1");
    assert_eq!(record.alarm_type.as_deref(), Some("AlarmConditionType"));
    assert_eq!(record.alert_name.as_deref(), Some("Tank1"));
    assert_eq!(record.property_description.as_deref(), Some("Level=3.5"));
    assert_eq!(record.source_system_id, "plant-a");
    assert_eq!(record.message, "Level high");

    let calls = server.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].object_id, condition());
    assert_eq!(calls[0].method_id, ids::ACKNOWLEDGEABLE_CONDITION_TYPE_ACKNOWLEDGE);
    assert_eq!(calls[0].input_arguments[0], Variant::ByteString(vec![0xE1, 0x0A]));
}

#[tokio::test]
async fn missing_required_field_drops_notification() {
    let server = plant();
    let sink = Arc::new(CollectingSink::default());
    let pipeline = pipeline(connected(&server).await, sink.clone());

    let mut values = event_values();
    values.remove("ConditionId");
    let err = pipeline
        .handle(notification(&values))
        .await
        .expect_err("dropped");
    assert!(matches!(
        err,
        PipelineError::Decode(DecodeError::MissingField("ConditionId"))
    ));
    assert!(sink.records().is_empty());
    assert!(server.calls().is_empty());

    // 后续通知照常处理。
    assert!(pipeline.handle(notification(&event_values())).await.is_ok());
    assert_eq!(sink.wait_for(1).await.len(), 1);
}

#[tokio::test]
async fn failed_acknowledge_still_delivers_record() {
    let server = plant();
    server.set_call_failure(true);
    let sink = Arc::new(CollectingSink::default());
    let pipeline = pipeline(connected(&server).await, sink.clone());

    assert!(pipeline.handle(notification(&event_values())).await.is_ok());
    assert_eq!(sink.wait_for(1).await.len(), 1);
}

#[tokio::test]
async fn disconnected_session_skips_enrichment() {
    let server = plant();
    let session = ProtocolSession::new(
        Arc::new(server.clone()),
        SessionConfig::new("opc.tcp://memory:4840"),
        Arc::new(DefaultCertificatePolicy::new(false)),
    );
    let sink = Arc::new(CollectingSink::default());
    let pipeline = pipeline(session, sink.clone());

    let record = pipeline
        .handle(notification(&event_values()))
        .await
        .expect("record");
    assert!(record.alarm_type.is_none());
    assert!(record.property_description.is_none());
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn manual_acknowledge_checks_input() {
    let server = plant();
    let sink = Arc::new(CollectingSink::default());
    let pipeline = pipeline(connected(&server).await, sink);

    assert!(matches!(
        pipeline.acknowledge_manual(&condition(), "not-hex", None).await,
        Err(PipelineError::InvalidEventId(_))
    ));
    assert!(
        pipeline
            .acknowledge_manual(&condition(), "E10A", Some("operator"))
            .await
            .expect("call")
    );
    assert!(
        !pipeline
            .acknowledge_manual(&NodeId::string(2, "Unknown"), "E10A", None)
            .await
            .expect("call")
    );
}

#[tokio::test]
async fn worker_consumes_subscription_notifications() {
    let server = plant();
    let session = connected(&server).await;
    let sink = Arc::new(CollectingSink::default());
    let pipeline = Arc::new(pipeline(session.clone(), sink.clone()));

    let (queue, rx) = pipeline.queue();
    let subscriptions = SubscriptionManager::new(vec!["Alarms".to_string()]);
    subscriptions
        .ensure(&session, Arc::new(queue))
        .await
        .expect("subscribed");

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(pipeline.clone().run(rx, cancel.clone()));

    assert_eq!(server.emit_event(&event_values()), 1);
    assert_eq!(sink.wait_for(1).await.len(), 1);

    cancel.cancel();
    worker.await.expect("worker stopped");
}

/// 模拟下游不可用：每次发布都要经历漫长的重试。
#[derive(Default)]
struct SlowSink {
    started: AtomicUsize,
    finished: AtomicUsize,
}

#[async_trait]
impl AlarmRecordSink for SlowSink {
    async fn publish(&self, records: Vec<AlarmRecord>) {
        self.started.fetch_add(records.len(), Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        self.finished.fetch_add(records.len(), Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_sink_does_not_stall_notification_handling() {
    let server = plant();
    let session = connected(&server).await;
    let sink = Arc::new(SlowSink::default());
    let pipeline = Arc::new(EventPipeline::new(
        session.clone(),
        Enricher::new(TypeBrowser::default(), vec!["Level".to_string()]),
        RecordMapper::new("plant-a", Arc::new(IdentitySource)),
        sink.clone(),
        PipelineConfig {
            queue_capacity: 4,
            ..PipelineConfig::default()
        },
    ));

    let (queue, rx) = pipeline.queue();
    let subscriptions = SubscriptionManager::new(vec!["Alarms".to_string()]);
    subscriptions
        .ensure(&session, Arc::new(queue))
        .await
        .expect("subscribed");
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(pipeline.clone().run(rx, cancel.clone()));

    for sequence in 0..20u8 {
        let mut values = event_values();
        values.insert("EventId".to_string(), Variant::ByteString(vec![0xA0, sequence]));
        assert_eq!(server.emit_event(&values), 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert_eq!(sink.started.load(Ordering::SeqCst), 20);
    assert_eq!(server.calls().len(), 20);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(sink.finished.load(Ordering::SeqCst), 20);

    cancel.cancel();
    worker.await.expect("worker stopped");
}

#[tokio::test]
async fn full_queue_counts_rejections_separately() {
    let server = plant();
    let sink = Arc::new(CollectingSink::default());
    let pipeline = EventPipeline::new(
        connected(&server).await,
        Enricher::new(TypeBrowser::default(), Vec::new()),
        RecordMapper::new("plant-a", Arc::new(IdentitySource)),
        sink,
        PipelineConfig {
            queue_capacity: 1,
            ..PipelineConfig::default()
        },
    );
    let (queue, _rx) = pipeline.queue();

    let before = gw_telemetry::metrics().snapshot();
    queue.on_event(notification(&event_values()));
    queue.on_event(notification(&event_values()));
    let after = gw_telemetry::metrics().snapshot();
    assert!(after.notifications_rejected > before.notifications_rejected);
    assert!(after.notifications_received >= before.notifications_received + 2);
}
