//! 会话管理：连接生命周期、保活监测与自动重连。
//!
//! ## 状态机
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!      ▲                        │                  │ keep-alive bad
//!      │                       err                 ▼
//!      └──────── disconnect ◀───┴──────────── Reconnecting ──ok──▶ Connected
//! ```
//!
//! 所有状态（当前会话引用、重连句柄、代数）都在同一把互斥锁内修改：
//! 保活触发的重连与轮询循环的 connect 因此天然串行，不会出现两个重连任务。
//! 锁内不做任何 `.await`。
//!
//! 调用方通过 `current()` 获取会话快照，不应跨越重连长期持有。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{
    CertificatePolicy, ConnectParams, KeepAliveHandler, UaConnector, UaSession, UserIdentity,
};
use crate::error::ProtocolError;
use crate::types::StatusCode;

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint_url: String,
    pub use_security: bool,
    pub identity: UserIdentity,
    pub session_name: String,
    pub session_timeout_ms: u64,
    pub keep_alive_interval_ms: u64,
    /// 0 表示不自动重连。
    pub reconnect_period_ms: u64,
}

impl SessionConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            use_security: false,
            identity: UserIdentity::Anonymous,
            session_name: "alarm-gateway".to_string(),
            session_timeout_ms: 30_000,
            keep_alive_interval_ms: 5_000,
            reconnect_period_ms: 10_000,
        }
    }
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
        }
    }
}

struct ReconnectHandle {
    id: u64,
    cancel: CancellationToken,
}

struct SessionInner {
    state: SessionState,
    session: Option<Arc<dyn UaSession>>,
    reconnect: Option<ReconnectHandle>,
    /// 每次成功握手（含重连）加一，订阅据此判断是否需要重建。
    generation: u64,
}

/// 单条自动化服务器会话的所有者。
pub struct ProtocolSession {
    connector: Arc<dyn UaConnector>,
    config: SessionConfig,
    certificate_policy: Arc<dyn CertificatePolicy>,
    inner: Mutex<SessionInner>,
    runtime: Option<Handle>,
    this: Weak<ProtocolSession>,
    next_reconnect_id: AtomicU64,
    reconnects_started: AtomicU64,
}

impl ProtocolSession {
    /// 创建会话管理器；需在 tokio 运行时内调用（重连任务使用当前运行时）。
    pub fn new(
        connector: Arc<dyn UaConnector>,
        config: SessionConfig,
        certificate_policy: Arc<dyn CertificatePolicy>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            connector,
            config,
            certificate_policy,
            inner: Mutex::new(SessionInner {
                state: SessionState::Disconnected,
                session: None,
                reconnect: None,
                generation: 0,
            }),
            runtime: Handle::try_current().ok(),
            this: this.clone(),
            next_reconnect_id: AtomicU64::new(1),
            reconnects_started: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.lock_inner().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn generation(&self) -> u64 {
        self.lock_inner().generation
    }

    /// 已启动的重连任务数。
    pub fn reconnects_started(&self) -> u64 {
        self.reconnects_started.load(Ordering::Relaxed)
    }

    /// 当前活动会话（仅在 Connected 状态可见）。
    pub fn current(&self) -> Option<Arc<dyn UaSession>> {
        self.current_with_generation().map(|(session, _)| session)
    }

    /// 当前活动会话及其代数（同一把锁内读取，保证二者一致）。
    pub fn current_with_generation(&self) -> Option<(Arc<dyn UaSession>, u64)> {
        let inner = self.lock_inner();
        if inner.state != SessionState::Connected {
            return None;
        }
        inner
            .session
            .as_ref()
            .map(|session| (session.clone(), inner.generation))
    }

    /// 建立连接；任何握手错误都返回 false 并记录日志。
    pub async fn connect(&self) -> bool {
        match self.try_connect().await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    target: "gw.protocol",
                    endpoint = %self.config.endpoint_url,
                    error = %err,
                    "session_connect_failed"
                );
                false
            }
        }
    }

    /// 建立连接，保留错误类型（启动阶段据此区分证书类致命错误）。
    pub async fn try_connect(&self) -> Result<(), ProtocolError> {
        {
            let mut inner = self.lock_inner();
            match inner.state {
                SessionState::Connected => return Ok(()),
                SessionState::Reconnecting => return Err(ProtocolError::Reconnecting),
                SessionState::Connecting => {
                    return Err(ProtocolError::Connection("connect in progress".to_string()));
                }
                SessionState::Disconnected => inner.state = SessionState::Connecting,
            }
        }

        info!(
            target: "gw.protocol",
            endpoint = %self.config.endpoint_url,
            use_security = self.config.use_security,
            "session_connecting"
        );
        let session = match self.connector.connect(&self.connect_params()).await {
            Ok(session) => session,
            Err(err) => {
                let mut inner = self.lock_inner();
                if inner.state == SessionState::Connecting {
                    inner.state = SessionState::Disconnected;
                }
                return Err(err);
            }
        };

        let installed = {
            let mut inner = self.lock_inner();
            if inner.state == SessionState::Connecting {
                inner.session = Some(session.clone());
                inner.state = SessionState::Connected;
                inner.generation += 1;
                true
            } else {
                false
            }
        };
        if !installed {
            // 握手期间被 disconnect，丢弃新会话。
            let _ = session.close().await;
            return Err(ProtocolError::NotConnected);
        }

        session.set_keep_alive(Some(self.keep_alive_handler()));
        info!(
            target: "gw.protocol",
            endpoint = %self.config.endpoint_url,
            session_id = session.id(),
            session_name = %session.name(),
            "session_connected"
        );
        Ok(())
    }

    /// 断开连接：注销保活、取消进行中的重连、关闭会话。重复调用无副作用。
    pub async fn disconnect(&self) {
        let (session, reconnect) = {
            let mut inner = self.lock_inner();
            inner.state = SessionState::Disconnected;
            (inner.session.take(), inner.reconnect.take())
        };
        if let Some(reconnect) = reconnect {
            reconnect.cancel.cancel();
            debug!(target: "gw.protocol", reconnect_id = reconnect.id, "reconnect_cancelled");
        }
        if let Some(session) = session {
            session.set_keep_alive(None);
            if let Err(err) = session.close().await {
                warn!(target: "gw.protocol", error = %err, "session_close_failed");
            }
            info!(target: "gw.protocol", session_id = session.id(), "session_disconnected");
        }
    }

    /// 保活回调入口（可在 SDK 线程上调用）。
    pub fn handle_keep_alive(&self, session_id: u64, status: StatusCode) {
        let reconnect_id = {
            let mut inner = self.lock_inner();
            let is_current = inner
                .session
                .as_ref()
                .map(|session| session.id() == session_id)
                .unwrap_or(false);
            if !is_current {
                debug!(target: "gw.protocol", session_id, "stale_keep_alive_ignored");
                return;
            }
            if status.is_good() {
                return;
            }
            if self.config.reconnect_period_ms == 0 {
                warn!(
                    target: "gw.protocol",
                    session_id,
                    status = %status,
                    "keep_alive_failed_reconnect_disabled"
                );
                return;
            }
            if inner.reconnect.is_some() {
                return;
            }
            let Some(runtime) = self.runtime.as_ref() else {
                error!(target: "gw.protocol", "reconnect_runtime_missing");
                return;
            };

            let reconnect_id = self.next_reconnect_id.fetch_add(1, Ordering::Relaxed);
            let cancel = CancellationToken::new();
            inner.reconnect = Some(ReconnectHandle {
                id: reconnect_id,
                cancel: cancel.clone(),
            });
            inner.state = SessionState::Reconnecting;
            self.reconnects_started.fetch_add(1, Ordering::Relaxed);
            gw_telemetry::record_reconnect_started();

            // 在锁内完成登记后再派生任务，保证句柄先于任务可见。
            runtime.spawn(run_reconnect(self.this.clone(), reconnect_id, cancel));
            reconnect_id
        };
        warn!(
            target: "gw.protocol",
            session_id,
            status = %status,
            reconnect_id,
            period_ms = self.config.reconnect_period_ms,
            "reconnect_started"
        );
    }

    fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            endpoint_url: self.config.endpoint_url.clone(),
            use_security: self.config.use_security,
            identity: self.config.identity.clone(),
            session_name: self.config.session_name.clone(),
            session_timeout_ms: self.config.session_timeout_ms,
            keep_alive_interval_ms: self.config.keep_alive_interval_ms,
            certificate_policy: self.certificate_policy.clone(),
        }
    }

    fn keep_alive_handler(&self) -> Arc<dyn KeepAliveHandler> {
        Arc::new(SessionKeepAlive {
            owner: self.this.clone(),
        })
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 重连成功后替换会话，返回被替换的旧会话；句柄已失效（被取消或替换）时返回 None。
    fn complete_reconnect(
        &self,
        reconnect_id: u64,
        session: Arc<dyn UaSession>,
    ) -> Option<Option<Arc<dyn UaSession>>> {
        let mut inner = self.lock_inner();
        let is_current = inner
            .reconnect
            .as_ref()
            .map(|handle| handle.id == reconnect_id)
            .unwrap_or(false);
        if !is_current {
            return None;
        }
        inner.reconnect = None;
        inner.state = SessionState::Connected;
        inner.generation += 1;
        Some(inner.session.replace(session))
    }
}

impl Drop for ProtocolSession {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(reconnect) = inner.reconnect.take() {
            reconnect.cancel.cancel();
        }
    }
}

struct SessionKeepAlive {
    owner: Weak<ProtocolSession>,
}

impl KeepAliveHandler for SessionKeepAlive {
    fn on_keep_alive(&self, session_id: u64, status: StatusCode) {
        if let Some(owner) = self.owner.upgrade() {
            owner.handle_keep_alive(session_id, status);
        }
    }
}

/// 按重连周期重复握手，直到成功或被取消。
async fn run_reconnect(owner: Weak<ProtocolSession>, reconnect_id: u64, cancel: CancellationToken) {
    let mut attempt: u64 = 0;
    loop {
        let period = match owner.upgrade() {
            Some(owner) => Duration::from_millis(owner.config.reconnect_period_ms),
            None => return,
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(period) => {}
        }

        let Some(session_owner) = owner.upgrade() else {
            return;
        };
        attempt += 1;
        let params = session_owner.connect_params();
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = session_owner.connector.connect(&params) => result,
        };

        match result {
            Ok(session) => {
                let Some(previous) = session_owner.complete_reconnect(reconnect_id, session.clone())
                else {
                    let _ = session.close().await;
                    return;
                };
                session.set_keep_alive(Some(session_owner.keep_alive_handler()));
                if let Some(previous) = previous {
                    previous.set_keep_alive(None);
                    let _ = previous.close().await;
                }
                info!(
                    target: "gw.protocol",
                    reconnect_id,
                    attempt,
                    session_id = session.id(),
                    "session_reconnected"
                );
                return;
            }
            Err(err) => {
                warn!(
                    target: "gw.protocol",
                    reconnect_id,
                    attempt,
                    error = %err,
                    "reconnect_attempt_failed"
                );
            }
        }
    }
}
