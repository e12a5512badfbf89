//! 路由定义
//!
//! - 健康与指标：/health, /metrics
//! - 后台任务：/api/workers/*
//! - 告警：/api/alarms/*
//! - 自动化服务器查询：/api/ua/*
//! - 组织层级：/api/configuration/*

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::middleware::request_context;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/api/workers", get(list_workers))
        .route("/api/workers/scheduler", get(get_scheduler))
        .route("/api/workers/scheduler/start", post(start_scheduler))
        .route("/api/workers/scheduler/stop", post(stop_scheduler))
        .route("/api/alarms/resend/:api", post(resend_stored_alarms))
        .route("/api/alarms/acknowledge", post(acknowledge_alarm))
        .route("/api/ua/server", get(get_server_info))
        .route("/api/ua/fields", get(get_fields))
        .route("/api/ua/value", get(get_node_value))
        .route("/api/configuration", get(get_configuration).put(update_configuration))
        .route("/api/configuration/refresh", post(refresh_configuration))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}
