use domain::{AlarmRecord, WebApi, format_alarm_time};

fn sample_record() -> AlarmRecord {
    AlarmRecord {
        id: AlarmRecord::stable_id("0A0B"),
        source_alarm_id: "0A0B".to_string(),
        priority_id: 3,
        start_time: Some("2024-05-01T10:00:00.000Z".to_string()),
        end_time: None,
        source: "Tank1.Level".to_string(),
        source_property: "ns=2;s=Tank1.Level".to_string(),
        alarm_type: Some("ExclusiveLevelAlarmType".to_string()),
        alert_name: Some("HighLevel".to_string()),
        property_description: None,
        source_system_id: "scada-1".to_string(),
        message: "Level high".to_string(),
    }
}

#[test]
fn alarm_record_uses_transport_field_names() {
    let json = serde_json::to_value(sample_record()).expect("json");
    for key in [
        "id",
        "sourceAlarmId",
        "priorityId",
        "startTime",
        "endTime",
        "source",
        "sourceProperty",
        "type",
        "alertName",
        "propertyDescription",
        "sourceSystemId",
        "message",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["priorityId"], 3);
}

#[test]
fn alarm_record_accepts_identifier_alias() {
    let mut json = serde_json::to_value(sample_record()).expect("json");
    let id = json["id"].take();
    let object = json.as_object_mut().expect("object");
    object.remove("id");
    object.insert("identifier".to_string(), id);
    let parsed: AlarmRecord = serde_json::from_value(json).expect("parsed");
    assert_eq!(parsed, sample_record());
}

#[test]
fn stable_id_is_deterministic() {
    assert_eq!(AlarmRecord::stable_id("ABCD"), AlarmRecord::stable_id("ABCD"));
    assert_ne!(AlarmRecord::stable_id("ABCD"), AlarmRecord::stable_id("ABCE"));
}

#[test]
fn alarm_time_has_millisecond_precision() {
    let time = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00.123456Z")
        .expect("time")
        .with_timezone(&chrono::Utc);
    assert_eq!(format_alarm_time(time), "2024-05-01T10:00:00.123Z");
}

#[test]
fn web_api_joins_prefix_and_route() {
    let api = WebApi::new("Thingworx", "http://example.local/")
        .with_url_prefix("/Thingworx/Things")
        .with_route("AddAlarmUrl", "/Alarms/Services/Add")
        .with_route("GetConfigurationUrl", "/Config/Services/Get");
    assert_eq!(
        api.add_alarm_url().as_deref(),
        Some("http://example.local/Thingworx/Things/Alarms/Services/Add")
    );
    assert_eq!(
        api.configuration_url().as_deref(),
        Some("http://example.local/Config/Services/Get")
    );
    assert!(WebApi::new("Other", "http://x").add_alarm_url().is_none());
}
