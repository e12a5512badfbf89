//! 协议 SDK 边界。
//!
//! 线路编码由 SDK 提供，本 crate 只依赖这里的 trait：
//! - `UaConnector`：握手建立会话
//! - `UaSession`：browse / read / call / 订阅原语
//! - `KeepAliveHandler`、`NotificationSink`：SDK 在自己的线程上回调
//! - `CertificatePolicy`：服务器证书信任决策

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ProtocolError;
use crate::types::{
    AttributeId, BrowseDescription, BrowseResult, CallMethodRequest, CallMethodResult,
    ContinuationPoint, DataValue, EventFilter, EventNotification, NodeId, ReadValueId, StatusCode,
};

/// 用户身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdentity {
    Anonymous,
    UserName { username: String, password: String },
}

/// 服务器证书摘要（交给信任策略判断）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub thumbprint: String,
}

/// 握手参数
#[derive(Clone)]
pub struct ConnectParams {
    pub endpoint_url: String,
    pub use_security: bool,
    pub identity: UserIdentity,
    pub session_name: String,
    pub session_timeout_ms: u64,
    pub keep_alive_interval_ms: u64,
    pub certificate_policy: Arc<dyn CertificatePolicy>,
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("endpoint_url", &self.endpoint_url)
            .field("use_security", &self.use_security)
            .field("session_name", &self.session_name)
            .field("session_timeout_ms", &self.session_timeout_ms)
            .field("keep_alive_interval_ms", &self.keep_alive_interval_ms)
            .finish()
    }
}

/// 订阅参数
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSettings {
    pub display_name: String,
    pub publishing_interval_ms: u64,
    pub publishing_enabled: bool,
    pub lifetime_count: u32,
    pub min_lifetime_interval_ms: u64,
}

impl SubscriptionSettings {
    /// 告警订阅默认参数：发布间隔 1000ms，生命周期计数 0，最小生命周期 120s。
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            publishing_interval_ms: 1_000,
            publishing_enabled: true,
            lifetime_count: 0,
            min_lifetime_interval_ms: 120_000,
        }
    }
}

/// 监控模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringMode {
    Disabled,
    Sampling,
    Reporting,
}

/// 事件监控项参数
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemSettings {
    pub start_node_id: NodeId,
    pub attribute_id: AttributeId,
    pub monitoring_mode: MonitoringMode,
    pub sampling_interval_ms: u64,
    pub queue_size: u32,
    pub discard_oldest: bool,
    pub filter: EventFilter,
}

/// 建立会话
#[async_trait]
pub trait UaConnector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn UaSession>, ProtocolError>;
}

/// 一条已建立的会话
#[async_trait]
pub trait UaSession: Send + Sync {
    /// 会话身份（重连后会变化）
    fn id(&self) -> u64;

    fn name(&self) -> &str;

    /// 批量浏览；每个请求对应一个结果。
    async fn browse(
        &self,
        nodes: &[BrowseDescription],
    ) -> Result<Vec<BrowseResult>, ProtocolError>;

    /// 续浏览；`release = true` 时仅释放令牌。
    async fn browse_next(
        &self,
        points: &[ContinuationPoint],
        release: bool,
    ) -> Result<Vec<BrowseResult>, ProtocolError>;

    /// 批量读取；每个请求对应一个结果。
    async fn read(&self, nodes: &[ReadValueId]) -> Result<Vec<DataValue>, ProtocolError>;

    async fn call(
        &self,
        requests: &[CallMethodRequest],
    ) -> Result<Vec<CallMethodResult>, ProtocolError>;

    /// 创建订阅，返回订阅 ID。
    async fn create_subscription(
        &self,
        settings: &SubscriptionSettings,
    ) -> Result<u32, ProtocolError>;

    /// 在订阅下创建事件监控项，返回监控项 ID。
    async fn create_event_monitored_item(
        &self,
        subscription_id: u32,
        settings: &MonitoredItemSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<u32, ProtocolError>;

    /// 安装或移除保活回调。
    fn set_keep_alive(&self, handler: Option<Arc<dyn KeepAliveHandler>>);

    async fn close(&self) -> Result<(), ProtocolError>;
}

/// 保活回调（由 SDK 在其线程上周期调用）
pub trait KeepAliveHandler: Send + Sync {
    fn on_keep_alive(&self, session_id: u64, status: StatusCode);
}

/// 事件通知回调（由 SDK 在其线程上调用，不得阻塞）
pub trait NotificationSink: Send + Sync {
    fn on_event(&self, notification: EventNotification);
}

/// 服务器证书信任策略
pub trait CertificatePolicy: Send + Sync {
    /// 返回 true 表示接受该证书。
    fn validate(&self, certificate: &CertificateInfo, error: StatusCode) -> bool;
}
