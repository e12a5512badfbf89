//! 协议错误类型定义

use crate::types::StatusCode;

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误（握手失败、服务器不可达）
    #[error("connection error: {0}")]
    Connection(String),

    /// 服务端返回的错误状态码
    #[error("bad status: {0}")]
    Status(StatusCode),

    /// 服务器证书被信任策略拒绝
    #[error("server certificate rejected: {subject}")]
    CertificateRejected { subject: String },

    /// 本地应用证书无效（不可恢复的启动错误）
    #[error("application certificate invalid: {0}")]
    ApplicationCertificate(String),

    /// 当前没有可用会话
    #[error("session not connected")]
    NotConnected,

    /// 重连进行中
    #[error("reconnect in progress")]
    Reconnecting,

    /// 节点标识解析错误
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    /// 分页浏览超过上限
    #[error("browse exceeded {0} continuation pages")]
    TooManyPages(usize),
}

impl ProtocolError {
    /// 是否为不可恢复的证书错误（进程需以证书错误码退出）。
    pub fn is_fatal_certificate(&self) -> bool {
        matches!(self, ProtocolError::ApplicationCertificate(_))
    }
}
