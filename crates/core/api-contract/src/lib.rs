//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 后台任务状态。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatusDto {
    pub name: String,
    pub status: String,
}

/// 手动重投结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendResultDto {
    pub api_name: String,
    pub attempted: usize,
    pub delivered: usize,
    pub stored: usize,
}

/// 手动确认告警请求体（eventId 为十六进制）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeAlarmRequest {
    #[serde(alias = "node_id")]
    pub node_id: String,
    #[serde(alias = "event_id")]
    pub event_id: String,
    pub message: Option<String>,
}

/// 手动确认告警结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeAlarmResponse {
    pub acknowledged: bool,
}

/// 节点查询参数。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeQuery {
    #[serde(alias = "node_id")]
    pub node_id: String,
}

/// 类型字段（InstanceDeclaration）返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDeclarationDto {
    pub root_type_id: String,
    pub node_id: String,
    pub browse_path: Vec<String>,
    pub display_path: String,
    pub display_name: String,
    pub node_class: String,
    pub modelling_rule: Option<String>,
    pub data_type: Option<String>,
    pub value_rank: Option<i32>,
    pub description: Option<String>,
    pub overridden_node_id: Option<String>,
}

/// 会话状态返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoDto {
    pub endpoint_url: String,
    pub state: String,
    pub session_id: Option<u64>,
    pub generation: u64,
    pub reconnects_started: u64,
}

/// 节点当前值返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeValueDto {
    pub node_id: String,
    pub value: serde_json::Value,
    pub status: String,
}

/// 组织层级节点返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNodeDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub full_id_path: String,
    pub full_name_path: String,
}

/// 组织层级替换请求体（payload 为配置服务返回的原始 JSON 字符串）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigurationRequest {
    pub payload: String,
}

/// 组织层级刷新结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshConfigurationResponse {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub node_count: usize,
}

/// 指标快照返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
    pub notifications_received: u64,
    pub notifications_dropped: u64,
    pub notifications_rejected: u64,
    pub alarms_acknowledged: u64,
    pub alarms_not_acknowledged: u64,
    pub reconnects_started: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub delivery_retries: u64,
    pub records_stored: u64,
    pub records_deleted: u64,
    pub storage_failures: u64,
    pub scheduler_ticks: u64,
    pub scheduler_tick_failures: u64,
}
