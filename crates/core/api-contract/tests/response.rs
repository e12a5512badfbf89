use api_contract::{ApiResponse, WorkerStatusDto};

#[test]
fn success_envelope_wraps_worker_status() {
    let response = ApiResponse::success(vec![WorkerStatusDto {
        name: "scheduler".to_string(),
        status: "Running".to_string(),
    }]);
    let value = serde_json::to_value(&response).expect("serialize");
    assert_eq!(value["success"], true);
    assert_eq!(value["data"][0]["status"], "Running");
    assert!(value["error"].is_null());
}

#[test]
fn error_envelope_carries_code_and_message() {
    let response = ApiResponse::<()>::error("SESSION.NOT_CONNECTED", "session not connected");
    let value = serde_json::to_value(&response).expect("serialize");
    assert_eq!(value["success"], false);
    assert!(value["data"].is_null());
    assert_eq!(value["error"]["code"], "SESSION.NOT_CONNECTED");
    assert_eq!(value["error"]["message"], "session not connected");
}
