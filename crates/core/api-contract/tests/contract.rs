use api_contract::{AcknowledgeAlarmRequest, HierarchyNodeDto, ResendResultDto};

#[test]
fn acknowledge_request_accepts_camel_case() {
    let payload = r#"{"nodeId":"ns=2;s=Tank1.HighLevel","eventId":"0A0B","message":"ok"}"#;
    let req: AcknowledgeAlarmRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.node_id, "ns=2;s=Tank1.HighLevel");
    assert_eq!(req.event_id, "0A0B");
    assert_eq!(req.message.as_deref(), Some("ok"));
}

#[test]
fn acknowledge_request_message_is_optional() {
    let payload = r#"{"node_id":"i=1","event_id":"FF"}"#;
    let req: AcknowledgeAlarmRequest = serde_json::from_str(payload).expect("parse");
    assert!(req.message.is_none());
}

#[test]
fn resend_result_is_camel_case() {
    let value = serde_json::to_value(ResendResultDto {
        api_name: "Thingworx".to_string(),
        attempted: 3,
        delivered: 2,
        stored: 1,
    })
    .expect("serialize");
    assert_eq!(value["apiName"], "Thingworx");
    assert!(value.get("api_name").is_none());
}

#[test]
fn hierarchy_node_type_is_renamed() {
    let value = serde_json::to_value(HierarchyNodeDto {
        id: "a".to_string(),
        name: "Site".to_string(),
        node_type: "site".to_string(),
        full_id_path: "e.a".to_string(),
        full_name_path: "Enterprise.Site".to_string(),
    })
    .expect("serialize");
    assert_eq!(value["type"], "site");
    assert_eq!(value["fullIdPath"], "e.a");
}
