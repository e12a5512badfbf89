use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gw_protocol::{
    DefaultCertificatePolicy, EventNotification, MemoryServer, NotificationSink, ProtocolError,
    ProtocolSession, SessionConfig, StatusCode, SubscriptionManager, Variant, ids,
};

#[derive(Default)]
struct CollectingSink {
    notifications: Mutex<Vec<EventNotification>>,
}

impl NotificationSink for CollectingSink {
    fn on_event(&self, notification: EventNotification) {
        self.notifications.lock().expect("lock").push(notification);
    }
}

fn session_for(server: &MemoryServer) -> Arc<ProtocolSession> {
    let mut config = SessionConfig::new("opc.tcp://memory:4840");
    config.reconnect_period_ms = 1_000;
    ProtocolSession::new(
        Arc::new(server.clone()),
        config,
        Arc::new(DefaultCertificatePolicy::new(false)),
    )
}

#[tokio::test]
async fn ensure_requires_connection() {
    let server = MemoryServer::new();
    let session = session_for(&server);
    let manager = SubscriptionManager::new(vec!["alarms".to_string()]);
    let err = manager
        .ensure(&session, Arc::new(CollectingSink::default()))
        .await
        .expect_err("not connected");
    assert!(matches!(err, ProtocolError::NotConnected));
}

#[tokio::test]
async fn creates_one_subscription_per_name_and_delivers_events() {
    let server = MemoryServer::new();
    let session = session_for(&server);
    assert!(session.connect().await);

    let sink = Arc::new(CollectingSink::default());
    let manager = SubscriptionManager::new(vec!["alarms".to_string(), "maintenance".to_string()]);
    assert!(manager.ensure(&session, sink.clone()).await.expect("ensure"));
    assert!(!manager.ensure(&session, sink.clone()).await.expect("ensure"));
    assert_eq!(server.monitored_item_count(), 2);
    assert_eq!(manager.subscription_ids(session.generation()).len(), 2);

    let values = HashMap::from([
        ("EventId".to_string(), Variant::ByteString(vec![0xAB, 0x01])),
        ("Severity".to_string(), Variant::UInt16(700)),
    ]);
    assert_eq!(server.emit_event(&values), 2);

    let notifications = sink.notifications.lock().expect("lock").clone();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].fields.len(), 13);
    assert_eq!(notifications[0].fields[0], Variant::ByteString(vec![0xAB, 0x01]));
    assert_eq!(notifications[0].fields[6], Variant::UInt16(700));
    assert_eq!(notifications[0].fields[8], Variant::Empty);
}

#[tokio::test]
async fn condition_refresh_targets_every_subscription() {
    let server = MemoryServer::new();
    let session = session_for(&server);
    assert!(session.connect().await);
    let manager = SubscriptionManager::new(vec!["a".to_string(), "b".to_string()]);
    manager
        .ensure(&session, Arc::new(CollectingSink::default()))
        .await
        .expect("ensure");

    assert_eq!(manager.condition_refresh(&session).await.expect("refresh"), 2);
    let calls = server.calls();
    assert_eq!(calls.len(), 2);
    for (call, subscription_id) in calls.iter().zip(manager.subscription_ids(1)) {
        assert_eq!(call.object_id, ids::CONDITION_TYPE);
        assert_eq!(call.method_id, ids::CONDITION_TYPE_CONDITION_REFRESH);
        assert_eq!(call.input_arguments, vec![Variant::UInt32(subscription_id)]);
    }
}

#[tokio::test(start_paused = true)]
async fn subscriptions_are_recreated_after_reconnect() {
    let server = MemoryServer::new();
    let session = session_for(&server);
    assert!(session.connect().await);
    let sink = Arc::new(CollectingSink::default());
    let manager = SubscriptionManager::new(vec!["alarms".to_string()]);
    assert!(manager.ensure(&session, sink.clone()).await.expect("ensure"));

    server.signal_keep_alive(StatusCode::BAD_CONNECTION_CLOSED);
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(session.generation(), 2);
    // 旧会话关闭后其监控项随之消失。
    assert_eq!(server.monitored_item_count(), 0);
    assert!(manager.subscription_ids(2).is_empty());

    assert!(manager.ensure(&session, sink.clone()).await.expect("ensure"));
    assert_eq!(server.monitored_item_count(), 1);
    assert_eq!(manager.subscription_ids(2).len(), 1);
}
