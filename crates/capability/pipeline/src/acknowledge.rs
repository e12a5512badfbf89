//! 告警确认。

use gw_protocol::{CallMethodRequest, LocalizedText, NodeId, UaSession, Variant, ids};
use tracing::{info, warn};

use crate::error::PipelineError;

/// 在条件节点上调用 Acknowledge（参数：原始 EventId 字节 + 操作员消息）。
///
/// 仅当返回恰好一个结果且状态为 Good 时视为已确认；调用异常记录日志并返回 false。
pub async fn acknowledge(
    session: &dyn UaSession,
    condition_id: &NodeId,
    event_id: &[u8],
    message: &str,
) -> bool {
    let request = CallMethodRequest {
        object_id: condition_id.clone(),
        method_id: ids::ACKNOWLEDGEABLE_CONDITION_TYPE_ACKNOWLEDGE,
        input_arguments: vec![
            Variant::ByteString(event_id.to_vec()),
            Variant::LocalizedText(LocalizedText::new(message)),
        ],
    };
    let acknowledged = match session.call(std::slice::from_ref(&request)).await {
        Ok(results) => match results.as_slice() {
            [result] if result.status.is_good() => true,
            [result] => {
                warn!(
                    target: "gw.pipeline",
                    condition = %condition_id,
                    status = %result.status,
                    "acknowledge_rejected"
                );
                false
            }
            results => {
                warn!(
                    target: "gw.pipeline",
                    condition = %condition_id,
                    results = results.len(),
                    "acknowledge_unexpected_results"
                );
                false
            }
        },
        Err(err) => {
            warn!(
                target: "gw.pipeline",
                condition = %condition_id,
                error = %err,
                "acknowledge_failed"
            );
            false
        }
    };
    if acknowledged {
        info!(
            target: "gw.pipeline",
            condition = %condition_id,
            event_id = %hex::encode_upper(event_id),
            "alarm_acknowledged"
        );
    }
    gw_telemetry::record_acknowledge(acknowledged);
    acknowledged
}

/// 解析十六进制 EventId（运维接口手工确认使用）。
pub fn parse_event_id(event_id_hex: &str) -> Result<Vec<u8>, PipelineError> {
    let trimmed = event_id_hex.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidEventId("event id is empty".to_string()));
    }
    hex::decode(trimmed).map_err(|err| PipelineError::InvalidEventId(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_in_either_case() {
        assert_eq!(parse_event_id("0aFF").expect("hex"), vec![0x0A, 0xFF]);
        assert!(parse_event_id("").is_err());
        assert!(parse_event_id("XYZ").is_err());
    }
}
