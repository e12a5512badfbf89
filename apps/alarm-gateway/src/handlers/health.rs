//! 健康检查与指标快照。
//!
//! - GET /health
//! - GET /metrics

use api_contract::MetricsDto;
use axum::{extract::State, response::Response};
use gw_telemetry::metrics;

use crate::state::AppState;
use crate::utils::response::ok;

pub async fn health(State(state): State<AppState>) -> Response {
    ok(serde_json::json!({
        "ok": true,
        "session": state.session.state().as_str(),
    }))
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsDto {
        notifications_received: snapshot.notifications_received,
        notifications_dropped: snapshot.notifications_dropped,
        notifications_rejected: snapshot.notifications_rejected,
        alarms_acknowledged: snapshot.alarms_acknowledged,
        alarms_not_acknowledged: snapshot.alarms_not_acknowledged,
        reconnects_started: snapshot.reconnects_started,
        deliveries_succeeded: snapshot.deliveries_succeeded,
        deliveries_failed: snapshot.deliveries_failed,
        delivery_retries: snapshot.delivery_retries,
        records_stored: snapshot.records_stored,
        records_deleted: snapshot.records_deleted,
        storage_failures: snapshot.storage_failures,
        scheduler_ticks: snapshot.scheduler_ticks,
        scheduler_tick_failures: snapshot.scheduler_tick_failures,
    })
}
