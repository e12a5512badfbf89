use domain::AlarmRecord;
use gw_storage::{AlarmStorage, InMemoryAlarmStorage, StoreOutcome};

fn record(event_id_hex: &str) -> AlarmRecord {
    AlarmRecord {
        id: AlarmRecord::stable_id(event_id_hex),
        source_alarm_id: event_id_hex.to_string(),
        priority_id: 5,
        start_time: None,
        end_time: None,
        source: "Line1".to_string(),
        source_property: "ns=2;s=Line1".to_string(),
        alarm_type: None,
        alert_name: None,
        property_description: None,
        source_system_id: String::new(),
        message: String::new(),
    }
}

#[tokio::test]
async fn in_memory_storage_is_scoped_per_api() {
    let storage = InMemoryAlarmStorage::new();
    let alarm = record("AA");

    assert_eq!(storage.store("ApiA", &alarm).await.expect("store"), StoreOutcome::Stored);
    assert_eq!(
        storage.store("ApiA", &alarm).await.expect("store"),
        StoreOutcome::AlreadyPresent
    );
    assert_eq!(storage.store("ApiB", &alarm).await.expect("store"), StoreOutcome::Stored);
    assert_eq!(storage.len(), 2);

    assert_eq!(storage.list("ApiA").await.expect("list"), vec![alarm.clone()]);
    assert!(storage.delete("ApiA", alarm.id).await.expect("delete"));
    assert!(!storage.delete("ApiA", alarm.id).await.expect("delete"));
    assert!(storage.list("ApiA").await.expect("list").is_empty());
    assert_eq!(storage.len(), 1);
}
