//! 后台任务状态与调度器启停
//!
//! - GET /api/workers
//! - GET /api/workers/scheduler
//! - POST /api/workers/scheduler/start
//! - POST /api/workers/scheduler/stop

use axum::{extract::State, response::Response};
use gw_delivery::Scheduler;
use tracing::info;

use crate::services::EventWorker;
use crate::state::AppState;
use crate::utils::response::{ok, worker_status_dto};

pub async fn list_workers(State(state): State<AppState>) -> Response {
    ok(vec![
        worker_status_dto(EventWorker::NAME, state.event_worker.status()),
        worker_status_dto(Scheduler::NAME, state.scheduler.status()),
    ])
}

pub async fn get_scheduler(State(state): State<AppState>) -> Response {
    ok(worker_status_dto(Scheduler::NAME, state.scheduler.status()))
}

/// 仅在 Stopped 时生效；其它状态原样返回当前状态。
pub async fn start_scheduler(State(state): State<AppState>) -> Response {
    let started = state.scheduler.start();
    info!(target: "gw.app", started, "scheduler_start_requested");
    ok(worker_status_dto(Scheduler::NAME, state.scheduler.status()))
}

pub async fn stop_scheduler(State(state): State<AppState>) -> Response {
    let requested = state.scheduler.request_stop();
    info!(target: "gw.app", requested, "scheduler_stop_requested");
    ok(worker_status_dto(Scheduler::NAME, state.scheduler.status()))
}
