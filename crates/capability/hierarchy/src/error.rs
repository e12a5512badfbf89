/// 层级配置错误。
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    /// 输入不合法（空载荷、名称不是 UUID 等），对应 400
    #[error("validation error: {0}")]
    Validation(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration service responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("web api {0} has no configuration route")]
    NoConfigurationRoute(String),
}
