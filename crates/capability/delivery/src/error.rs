/// 投递链路错误。
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("downstream responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("web api {0} not found")]
    UnknownApi(String),
    #[error("web api {0} has no add alarm route")]
    NoAddRoute(String),
}

impl DeliveryError {
    /// 可重试：网络故障、5xx、408。
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Transport(_) => true,
            DeliveryError::Status { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }
}

impl From<gw_storage::StorageError> for DeliveryError {
    fn from(err: gw_storage::StorageError) -> Self {
        DeliveryError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DeliveryError::Transport("reset".to_string()).is_transient());
        for status in [500, 503, 408] {
            assert!(DeliveryError::Status { status, body: String::new() }.is_transient());
        }
        for status in [400, 404, 409] {
            assert!(!DeliveryError::Status { status, body: String::new() }.is_transient());
        }
        assert!(!DeliveryError::NoAddRoute("ApiA".to_string()).is_transient());
    }
}
