//! 告警运维
//!
//! - POST /api/alarms/resend/{api}：重投某个 API 的磁盘暂存告警
//! - POST /api/alarms/acknowledge：手工确认

use api_contract::{AcknowledgeAlarmRequest, AcknowledgeAlarmResponse, ResendResultDto};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use gw_protocol::NodeId;

use crate::state::AppState;
use crate::utils::normalize_required;
use crate::utils::response::{bad_request_error, delivery_error, ok, pipeline_error};

pub async fn resend_stored_alarms(State(state): State<AppState>, Path(api): Path<String>) -> Response {
    match state.queue.send_stored_items(&api).await {
        Ok(outcome) => ok(ResendResultDto {
            api_name: outcome.api_name,
            attempted: outcome.attempted,
            delivered: outcome.delivered,
            stored: outcome.stored,
        }),
        Err(err) => delivery_error(err),
    }
}

pub async fn acknowledge_alarm(
    State(state): State<AppState>,
    Json(req): Json<AcknowledgeAlarmRequest>,
) -> Response {
    let node_id = match normalize_required(req.node_id, "nodeId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let event_id = match normalize_required(req.event_id, "eventId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let condition_id: NodeId = match node_id.parse() {
        Ok(id) => id,
        Err(err) => return bad_request_error(format!("{err}")),
    };
    match state
        .pipeline
        .acknowledge_manual(&condition_id, &event_id, req.message.as_deref())
        .await
    {
        Ok(acknowledged) => ok(AcknowledgeAlarmResponse { acknowledged }),
        Err(err) => pipeline_error(err),
    }
}
