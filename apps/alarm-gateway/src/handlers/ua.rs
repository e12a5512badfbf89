//! 自动化服务器查询
//!
//! - GET /api/ua/server：会话状态
//! - GET /api/ua/fields?nodeId=：类型字段（含继承与覆盖）
//! - GET /api/ua/value?nodeId=：节点当前值

use api_contract::{InstanceDeclarationDto, NodeQuery, NodeValueDto, ServerInfoDto};
use axum::{
    extract::{Query, State},
    response::Response,
};
use gw_protocol::{NodeId, ReadValueId};

use crate::state::AppState;
use crate::utils::normalize_required;
use crate::utils::response::{
    bad_request_error, declaration_to_dto, internal_error, not_found_error, ok, service_unavailable_error,
};

fn parse_node_id(value: String) -> Result<NodeId, Response> {
    let value = normalize_required(value, "nodeId")?;
    value.parse().map_err(|err| bad_request_error(format!("{err}")))
}

pub async fn get_server_info(State(state): State<AppState>) -> Response {
    let session = &state.session;
    ok(ServerInfoDto {
        endpoint_url: session.config().endpoint_url.clone(),
        state: session.state().as_str().to_string(),
        session_id: session.current().map(|current| current.id()),
        generation: session.generation(),
        reconnects_started: session.reconnects_started(),
    })
}

pub async fn get_fields(State(state): State<AppState>, Query(query): Query<NodeQuery>) -> Response {
    let node_id = match parse_node_id(query.node_id) {
        Ok(node_id) => node_id,
        Err(response) => return response,
    };
    let Some(session) = state.session.current() else {
        return service_unavailable_error();
    };
    let declarations = state.browser.collect(session.as_ref(), &node_id).await;
    let data: Vec<InstanceDeclarationDto> = declarations
        .iter()
        .map(|(id, declaration)| {
            declaration_to_dto(declaration, declarations.overridden_of(id))
        })
        .collect();
    ok(data)
}

pub async fn get_node_value(State(state): State<AppState>, Query(query): Query<NodeQuery>) -> Response {
    let node_id = match parse_node_id(query.node_id) {
        Ok(node_id) => node_id,
        Err(response) => return response,
    };
    let Some(session) = state.session.current() else {
        return service_unavailable_error();
    };
    let values = match session.read(&[ReadValueId::value(node_id.clone())]).await {
        Ok(values) => values,
        Err(err) => return internal_error(err.to_string()),
    };
    match values.into_iter().next() {
        Some(value) if value.status.is_bad() => not_found_error(format!("{}: {}", node_id, value.status)),
        Some(value) => ok(NodeValueDto {
            node_id: node_id.to_string(),
            value: value.value.to_json(),
            status: value.status.to_string(),
        }),
        None => not_found_error(node_id.to_string()),
    }
}
