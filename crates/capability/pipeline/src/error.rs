use gw_protocol::ProtocolError;

/// 通知解码错误（单条通知丢弃，不影响后续通知）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("field {field} has unexpected type, expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Pipeline 处理错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("invalid event id: {0}")]
    InvalidEventId(String),
    #[error("session not connected")]
    NotConnected,
}
