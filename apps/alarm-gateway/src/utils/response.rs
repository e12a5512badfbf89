//! 统一错误响应与 DTO 转换
//!
//! - 错误响应：bad_request_error、not_found_error、service_unavailable_error、internal_error
//! - 错误映射：delivery_error、pipeline_error、hierarchy_error
//! - DTO 转换：declaration_to_dto、hierarchy_node_to_dto、worker_status_dto

use api_contract::{ApiResponse, HierarchyNodeDto, InstanceDeclarationDto, WorkerStatusDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gw_delivery::{DeliveryError, WorkerStatus};
use gw_hierarchy::{HierarchyError, HierarchyNode};
use gw_pipeline::PipelineError;
use gw_protocol::{InstanceDeclaration, NodeId, ids};

/// 成功响应
pub fn ok<T: serde::Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", message.into())),
    )
        .into_response()
}

/// 会话未连接
pub fn service_unavailable_error() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiResponse::<()>::error("SESSION.NOT_CONNECTED", "session not connected")),
    )
        .into_response()
}

/// 内部错误响应
pub fn internal_error(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", message.into())),
    )
        .into_response()
}

pub fn delivery_error(err: DeliveryError) -> Response {
    match err {
        DeliveryError::UnknownApi(_) => not_found_error(err.to_string()),
        DeliveryError::NoAddRoute(_) => bad_request_error(err.to_string()),
        other => internal_error(other.to_string()),
    }
}

pub fn pipeline_error(err: PipelineError) -> Response {
    match err {
        PipelineError::InvalidEventId(_) | PipelineError::Decode(_) => bad_request_error(err.to_string()),
        PipelineError::NotConnected => service_unavailable_error(),
        other => internal_error(other.to_string()),
    }
}

pub fn hierarchy_error(err: HierarchyError) -> Response {
    match err {
        HierarchyError::Validation(_) => bad_request_error(err.to_string()),
        other => internal_error(other.to_string()),
    }
}

pub fn worker_status_dto(name: &str, status: WorkerStatus) -> WorkerStatusDto {
    WorkerStatusDto {
        name: name.to_string(),
        status: status.as_str().to_string(),
    }
}

fn modelling_rule_name(rule: &NodeId) -> String {
    if *rule == ids::MODELLING_RULE_MANDATORY {
        "Mandatory".to_string()
    } else if *rule == ids::MODELLING_RULE_OPTIONAL {
        "Optional".to_string()
    } else {
        rule.to_string()
    }
}

/// InstanceDeclaration 转 DTO（`overridden` 为被覆盖声明的节点）
pub fn declaration_to_dto(
    declaration: &InstanceDeclaration,
    overridden: Option<&InstanceDeclaration>,
) -> InstanceDeclarationDto {
    InstanceDeclarationDto {
        root_type_id: declaration.root_type_id.to_string(),
        node_id: declaration.node_id.to_string(),
        browse_path: declaration
            .browse_path
            .iter()
            .map(|name| name.to_string())
            .collect(),
        display_path: declaration.display_path.clone(),
        display_name: declaration.display_name.clone(),
        node_class: declaration.node_class.as_str().to_string(),
        modelling_rule: declaration.modelling_rule.as_ref().map(modelling_rule_name),
        data_type: declaration.data_type.as_ref().map(|id| id.to_string()),
        value_rank: declaration.value_rank,
        description: declaration.description.clone(),
        overridden_node_id: overridden.map(|prior| prior.node_id.to_string()),
    }
}

pub fn hierarchy_node_to_dto(node: &HierarchyNode) -> HierarchyNodeDto {
    HierarchyNodeDto {
        id: node.id.to_string(),
        name: node.name.clone(),
        node_type: node.level.as_str().to_string(),
        full_id_path: node.full_id_path.clone(),
        full_name_path: node.full_name_path.clone(),
    }
}
