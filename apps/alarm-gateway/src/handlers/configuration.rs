//! 组织层级
//!
//! - GET /api/configuration：当前层级（缓存为空时从配置 API 拉取）
//! - PUT /api/configuration：用原始 JSON 载荷替换缓存
//! - POST /api/configuration/refresh：强制从配置 API 拉取

use api_contract::{HierarchyNodeDto, RefreshConfigurationResponse, UpdateConfigurationRequest};
use axum::{Json, extract::State, response::Response};
use gw_hierarchy::Hierarchy;

use crate::state::AppState;
use crate::utils::response::{hierarchy_error, hierarchy_node_to_dto, not_found_error, ok};

fn nodes_to_dto(hierarchy: &Hierarchy) -> Vec<HierarchyNodeDto> {
    hierarchy.nodes().iter().map(hierarchy_node_to_dto).collect()
}

pub async fn get_configuration(State(state): State<AppState>) -> Response {
    match state.accessor.get().await {
        Some(hierarchy) => ok(nodes_to_dto(&hierarchy)),
        None => not_found_error("configuration not found"),
    }
}

pub async fn update_configuration(
    State(state): State<AppState>,
    Json(req): Json<UpdateConfigurationRequest>,
) -> Response {
    match state.accessor.cache().update(&req.payload) {
        Ok(hierarchy) => ok(nodes_to_dto(&hierarchy)),
        Err(err) => hierarchy_error(err),
    }
}

pub async fn refresh_configuration(State(state): State<AppState>) -> Response {
    let report = state.accessor.refresh().await;
    ok(RefreshConfigurationResponse {
        refreshed: report.refreshed,
        failed: report.failed,
        node_count: report.node_count,
    })
}
