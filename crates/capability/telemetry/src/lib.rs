//! 追踪、请求 ID 生成与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub notifications_received: u64,
    pub notifications_dropped: u64,
    pub notifications_rejected: u64,
    pub alarms_acknowledged: u64,
    pub alarms_not_acknowledged: u64,
    pub reconnects_started: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub delivery_retries: u64,
    pub records_stored: u64,
    pub records_deleted: u64,
    pub storage_failures: u64,
    pub scheduler_ticks: u64,
    pub scheduler_tick_failures: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    notifications_received: AtomicU64,
    notifications_dropped: AtomicU64,
    notifications_rejected: AtomicU64,
    alarms_acknowledged: AtomicU64,
    alarms_not_acknowledged: AtomicU64,
    reconnects_started: AtomicU64,
    deliveries_succeeded: AtomicU64,
    deliveries_failed: AtomicU64,
    delivery_retries: AtomicU64,
    records_stored: AtomicU64,
    records_deleted: AtomicU64,
    storage_failures: AtomicU64,
    scheduler_ticks: AtomicU64,
    scheduler_tick_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            notifications_received: AtomicU64::new(0),
            notifications_dropped: AtomicU64::new(0),
            notifications_rejected: AtomicU64::new(0),
            alarms_acknowledged: AtomicU64::new(0),
            alarms_not_acknowledged: AtomicU64::new(0),
            reconnects_started: AtomicU64::new(0),
            deliveries_succeeded: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
            delivery_retries: AtomicU64::new(0),
            records_stored: AtomicU64::new(0),
            records_deleted: AtomicU64::new(0),
            storage_failures: AtomicU64::new(0),
            scheduler_ticks: AtomicU64::new(0),
            scheduler_tick_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            notifications_rejected: self.notifications_rejected.load(Ordering::Relaxed),
            alarms_acknowledged: self.alarms_acknowledged.load(Ordering::Relaxed),
            alarms_not_acknowledged: self.alarms_not_acknowledged.load(Ordering::Relaxed),
            reconnects_started: self.reconnects_started.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            delivery_retries: self.delivery_retries.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            records_deleted: self.records_deleted.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            scheduler_ticks: self.scheduler_ticks.load(Ordering::Relaxed),
            scheduler_tick_failures: self.scheduler_tick_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的事件通知数。
pub fn record_notification_received() {
    metrics()
        .notifications_received
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录解码/处理失败被丢弃的通知数。
pub fn record_notification_dropped() {
    metrics()
        .notifications_dropped
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录处理队列已满而被拒收的通知数（背压）。
pub fn record_notification_rejected() {
    metrics()
        .notifications_rejected
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录源端确认结果。
pub fn record_acknowledge(acknowledged: bool) {
    let counter = if acknowledged {
        &metrics().alarms_acknowledged
    } else {
        &metrics().alarms_not_acknowledged
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// 记录启动的重连次数。
pub fn record_reconnect_started() {
    metrics().reconnects_started.fetch_add(1, Ordering::Relaxed);
}

/// 记录投递成功次数（下游 2xx）。
pub fn record_delivery_success() {
    metrics()
        .deliveries_succeeded
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录投递失败次数（重试耗尽或不可重试）。
pub fn record_delivery_failure() {
    metrics().deliveries_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录投递重试次数。
pub fn record_delivery_retry() {
    metrics().delivery_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入磁盘队列的记录数。
pub fn record_record_stored() {
    metrics().records_stored.fetch_add(1, Ordering::Relaxed);
}

/// 记录从磁盘队列删除的记录数。
pub fn record_record_deleted() {
    metrics().records_deleted.fetch_add(1, Ordering::Relaxed);
}

/// 记录磁盘队列读写失败次数。
pub fn record_storage_failure() {
    metrics().storage_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录调度器执行轮次。
pub fn record_scheduler_tick(failed: bool) {
    let metrics = metrics();
    metrics.scheduler_ticks.fetch_add(1, Ordering::Relaxed);
    if failed {
        metrics
            .scheduler_tick_failures
            .fetch_add(1, Ordering::Relaxed);
    }
}
