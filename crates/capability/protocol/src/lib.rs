//! # 自动化服务器协议能力模块
//!
//! 线路协议由 SDK 实现，本模块在 SDK 边界（`client`）之上提供：
//! - **ProtocolSession**：连接生命周期、保活监测、自动重连（单锁状态机）
//! - **TypeBrowser**：类型字段（InstanceDeclaration）发现，含继承与覆盖
//! - **SubscriptionManager**：固定事件过滤器的告警订阅，会话更替后重建
//! - **MemoryServer**：内存地址空间，供测试与离线演示注入
//!
//! ## 架构设计
//!
//! ```text
//! UaConnector ──connect──▶ ProtocolSession ──current()──▶ Arc<dyn UaSession>
//!                              │ keep-alive                 │
//!                              ▼                            ├── TypeBrowser (browse/read)
//!                         reconnect task                    ├── SubscriptionManager
//!                                                           └── call (acknowledge)
//! ```

pub mod browser;
pub mod certificate;
pub mod client;
mod error;
pub mod ids;
pub mod memory;
pub mod session;
pub mod subscription;
mod types;

pub use browser::{
    BrowserOptions, DeclarationId, InstanceDeclaration, InstanceDeclarationSet, TypeBrowser,
};
pub use certificate::DefaultCertificatePolicy;
pub use client::{
    CertificateInfo, CertificatePolicy, ConnectParams, KeepAliveHandler, MonitoredItemSettings,
    MonitoringMode, NotificationSink, SubscriptionSettings, UaConnector, UaSession, UserIdentity,
};
pub use error::ProtocolError;
pub use memory::{MemoryNode, MemoryServer};
pub use session::{ProtocolSession, SessionConfig, SessionState};
pub use subscription::{SubscriptionManager, alarm_event_filter, field_name};
pub use types::*;
