//! 告警网关进程入口。
//!
//! 启动顺序：加载配置 → 初始化日志 → 组装会话/流水线/投递队列/层级解析 →
//! 首次连接（应用证书无效直接退出）→ 启动后台任务（alarm-events、scheduler）→ 运维 HTTP 接口。
//!
//! 退出码：0x80 未启动（配置无效）、0x82 意外错误、0x84 证书无效。

mod demo;
mod handlers;
mod middleware;
mod routes;
mod services;
mod state;
mod utils;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use gw_config::{AppConfig, ConfigError};
use gw_delivery::{DeliveryError, DeliveryQueue, HttpAlarmTransport, RetryPolicy, Scheduler};
use gw_hierarchy::{ConfigurationAccessor, ConfigurationClient, HierarchyCache, HierarchyError, SourceResolver};
use gw_pipeline::{Enricher, EventPipeline, PipelineConfig, RecordMapper};
use gw_protocol::{
    DefaultCertificatePolicy, ProtocolSession, SessionConfig, SubscriptionManager,
    TypeBrowser, UaConnector, UserIdentity,
};
use gw_storage::FileAlarmStorage;
use gw_telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::services::{DeliveryRecordSink, EventWorker, HierarchySourceLookup};
use crate::state::AppState;

const EXIT_NOT_STARTED: u8 = 0x80;
const EXIT_UNEXPECTED: u8 = 0x82;
const EXIT_CERTIFICATE_INVALID: u8 = 0x84;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SIMULATED_ALARM_INTERVAL: Duration = Duration::from_secs(30);

/// 启动期错误（决定退出码）。
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration invalid: {0}")]
    Config(#[from] ConfigError),
    #[error("certificate invalid: {0}")]
    Certificate(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("delivery setup failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("hierarchy setup failed: {0}")]
    Hierarchy(#[from] HierarchyError),
}

impl StartupError {
    fn exit_code(&self) -> u8 {
        match self {
            StartupError::Config(_) => EXIT_NOT_STARTED,
            StartupError::Certificate(_) => EXIT_CERTIFICATE_INVALID,
            _ => EXIT_UNEXPECTED,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: "gw.app", error = %err, exit_code = err.exit_code(), "gateway_exit");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    let shutdown = CancellationToken::new();
    // 线协议实现不在本仓库内；目前只提供模拟地址空间。
    if !config.opcua.simulated {
        return Err(StartupError::Config(ConfigError::Invalid(
            "GW_OPCUA_SIMULATED".to_string(),
            "no protocol adapter available; set GW_OPCUA_SIMULATED=true".to_string(),
        )));
    }
    let plant = demo::plant();
    info!(target: "gw.app", "simulated_address_space_enabled");
    let state = build_state(&config, Arc::new(plant.clone()), shutdown.clone())?;

    // 应用证书无效不可恢复；其它连接错误交给轮询循环重试。
    if let Err(err) = state.session.try_connect().await {
        if err.is_fatal_certificate() {
            return Err(StartupError::Certificate(err.to_string()));
        }
        warn!(target: "gw.app", error = %err, "initial_connect_failed");
    }

    let worker = state.event_worker.clone();
    let mut events = tokio::spawn(async move { worker.run().await });
    state.scheduler.start();
    tokio::spawn(demo::run_simulator(plant, SIMULATED_ALARM_INTERVAL, shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "gw.app", addr = %config.http_addr, "http_listening");
    let app = routes::create_router(state.clone());
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown.cancelled_owned())
            .await
    });

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(target: "gw.app", "shutdown_signal_received");
            Ok(())
        }
        joined = &mut events => match joined {
            Ok(Err(err)) => Err(StartupError::Certificate(err.to_string())),
            Ok(Ok(())) => Ok(()),
            Err(err) => Err(StartupError::Io(std::io::Error::other(err.to_string()))),
        },
        served = &mut server => match served {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(StartupError::Io(err)),
            Err(err) => Err(StartupError::Io(std::io::Error::other(err.to_string()))),
        },
    };

    shutdown.cancel();
    state.session.disconnect().await;
    info!(target: "gw.app", "gateway_stopped");
    result
}

fn build_state(
    config: &AppConfig,
    connector: Arc<dyn UaConnector>,
    shutdown: CancellationToken,
) -> Result<AppState, StartupError> {
    let opcua = &config.opcua;
    let mut session_config = SessionConfig::new(opcua.server_url.clone());
    session_config.use_security = opcua.use_security;
    session_config.identity = match (&opcua.username, &opcua.password) {
        (Some(username), Some(password)) => UserIdentity::UserName {
            username: username.clone(),
            password: password.clone(),
        },
        _ => UserIdentity::Anonymous,
    };
    session_config.session_timeout_ms = opcua.session_lifetime_ms;
    session_config.keep_alive_interval_ms = opcua.keep_alive_ms;
    session_config.reconnect_period_ms = opcua.reconnect_period_ms;
    let session = ProtocolSession::new(
        connector,
        session_config,
        Arc::new(DefaultCertificatePolicy::new(opcua.auto_accept_untrusted)),
    );

    let delivery = &config.delivery;
    let transport = HttpAlarmTransport::new(HTTP_TIMEOUT)?;
    let queue = Arc::new(DeliveryQueue::new(
        Arc::new(transport),
        Arc::new(FileAlarmStorage::new(&delivery.cache_location)),
        RetryPolicy::new(
            delivery.retry_count,
            Duration::from_millis(delivery.first_retry_delay_ms),
        ),
        delivery.web_apis.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        queue.clone(),
        Duration::from_secs(delivery.schedule_interval_seconds),
        shutdown.clone(),
    ));

    let configuration_apis = delivery
        .update_configuration_web_apis
        .iter()
        .filter_map(|name| config.find_web_api(name).cloned())
        .collect();
    let accessor = Arc::new(ConfigurationAccessor::new(
        Arc::new(HierarchyCache::new()),
        Arc::new(ConfigurationClient::new(HTTP_TIMEOUT)?),
        configuration_apis,
    ));
    let resolver = SourceResolver::new(accessor.clone(), config.alarm.fallback_source_id.clone());

    let browser = TypeBrowser::default();
    let pipeline = Arc::new(EventPipeline::new(
        session.clone(),
        Enricher::new(browser.clone(), opcua.fields.clone()),
        RecordMapper::new(
            config.alarm.fallback_source_system_id.clone(),
            Arc::new(HierarchySourceLookup::new(resolver)),
        ),
        Arc::new(DeliveryRecordSink::new(queue.clone())),
        PipelineConfig {
            auto_acknowledge: config.alarm.auto_acknowledge,
            acknowledge_message: config.alarm.acknowledge_message.clone(),
            ..PipelineConfig::default()
        },
    ));
    let event_worker = Arc::new(EventWorker::new(
        session.clone(),
        SubscriptionManager::new(opcua.subscriptions.clone()),
        pipeline.clone(),
        Duration::from_millis(opcua.connect_poll_ms),
        shutdown,
    ));

    Ok(AppState {
        session,
        browser,
        pipeline,
        queue,
        scheduler,
        event_worker,
        accessor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_startup_error_kind() {
        let config = StartupError::Config(ConfigError::Missing("GW_OPCUA_SERVER_URL".to_string()));
        assert_eq!(config.exit_code(), 0x80);
        let certificate = StartupError::Certificate(
            gw_protocol::ProtocolError::ApplicationCertificate("expired".to_string()).to_string(),
        );
        assert_eq!(certificate.exit_code(), 0x84);
        let io = StartupError::Io(std::io::Error::other("bind"));
        assert_eq!(io.exit_code(), 0x82);
    }
}
