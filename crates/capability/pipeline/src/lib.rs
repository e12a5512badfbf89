//! 告警事件流水线。
//!
//! 通知由协议 SDK 在其线程上回调进入有界队列（`NotificationQueue`），
//! 单个后台任务串行处理：解码 → 增强 → 确认 → 映射为 AlarmRecord → 交给记录接收方。
//! 同一会话上的增强不并行，避免 browse/read 风暴。
//! 记录接收方在独立任务中执行，下游投递再慢也不占用通知处理。

mod acknowledge;
mod enrich;
mod error;
mod event;
mod record;

pub use acknowledge::{acknowledge, parse_event_id};
pub use enrich::{Enricher, value_key};
pub use error::{DecodeError, PipelineError};
pub use event::{AlarmEvent, decode, field_map, field_names};
pub use record::{IdentitySource, RecordMapper, SourceLookup, property_description, severity_bucket};

use async_trait::async_trait;
use domain::AlarmRecord;
use gw_protocol::{EventNotification, NodeId, NotificationSink, ProtocolSession, alarm_event_filter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 生成的告警记录的接收方（投递队列）。
///
/// `publish` 在独立任务中调用，可以耗时（重试、落盘）。
#[async_trait]
pub trait AlarmRecordSink: Send + Sync {
    async fn publish(&self, records: Vec<AlarmRecord>);
}

/// Pipeline 参数。
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    /// 收到告警即自动确认
    pub auto_acknowledge: bool,
    pub acknowledge_message: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            auto_acknowledge: true,
            acknowledge_message: "Auto Acknowledged".to_string(),
        }
    }
}

impl PipelineConfig {
    fn sanitized(mut self) -> Self {
        if self.queue_capacity == 0 {
            self.queue_capacity = 1;
        }
        self
    }
}

/// 通知入口：SDK 回调线程上非阻塞入队，队列满时拒收并单独计数。
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<EventNotification>,
}

impl NotificationSink for NotificationQueue {
    fn on_event(&self, notification: EventNotification) {
        gw_telemetry::record_notification_received();
        if let Err(err) = self.tx.try_send(notification) {
            gw_telemetry::record_notification_rejected();
            warn!(target: "gw.pipeline", error = %err, "notification_queue_rejected");
        }
    }
}

/// 事件流水线
pub struct EventPipeline {
    session: Arc<ProtocolSession>,
    field_names: Vec<String>,
    enricher: Enricher,
    mapper: RecordMapper,
    sink: Arc<dyn AlarmRecordSink>,
    config: PipelineConfig,
}

impl EventPipeline {
    pub fn new(
        session: Arc<ProtocolSession>,
        enricher: Enricher,
        mapper: RecordMapper,
        sink: Arc<dyn AlarmRecordSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            session,
            field_names: field_names(&alarm_event_filter()),
            enricher,
            mapper,
            sink,
            config: config.sanitized(),
        }
    }

    /// 创建通知队列（发送端交给订阅，接收端交给 `run`）。
    pub fn queue(&self) -> (NotificationQueue, mpsc::Receiver<EventNotification>) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        (NotificationQueue { tx }, rx)
    }

    /// 处理一条通知；解码失败的通知被丢弃并返回错误。
    pub async fn handle(&self, notification: EventNotification) -> Result<AlarmRecord, PipelineError> {
        let mut event = match decode(&self.field_names, &notification) {
            Ok(event) => event,
            Err(err) => {
                gw_telemetry::record_notification_dropped();
                warn!(
                    target: "gw.pipeline",
                    subscription_id = notification.subscription_id,
                    error = %err,
                    "notification_dropped"
                );
                return Err(err.into());
            }
        };

        match self.session.current() {
            Some(session) => {
                self.enricher.enrich(session.as_ref(), &mut event).await;
                if self.config.auto_acknowledge {
                    acknowledge(
                        session.as_ref(),
                        &event.condition_id,
                        &event.event_id,
                        &self.config.acknowledge_message,
                    )
                    .await;
                }
            }
            None => {
                warn!(
                    target: "gw.pipeline",
                    event_id = %event.event_id_hex,
                    "enrichment_skipped_not_connected"
                );
            }
        }

        let record = self.mapper.map(&event).await;
        info!(
            target: "gw.pipeline",
            alarm_id = %record.id,
            event_id = %event.event_id_hex,
            source = %event.source_node,
            priority = record.priority_id,
            "alarm_raised"
        );
        let sink = Arc::clone(&self.sink);
        let handoff = record.clone();
        tokio::spawn(async move { sink.publish(vec![handoff]).await });
        Ok(record)
    }

    /// 手工确认（事件 ID 为十六进制）。
    pub async fn acknowledge_manual(
        &self,
        condition_id: &NodeId,
        event_id_hex: &str,
        message: Option<&str>,
    ) -> Result<bool, PipelineError> {
        let event_id = parse_event_id(event_id_hex)?;
        let session = self.session.current().ok_or(PipelineError::NotConnected)?;
        let message = message.unwrap_or(&self.config.acknowledge_message);
        Ok(acknowledge(session.as_ref(), condition_id, &event_id, message).await)
    }

    /// 串行消费通知直到取消或发送端全部关闭。
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<EventNotification>,
        cancel: CancellationToken,
    ) {
        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => break,
                notification = rx.recv() => match notification {
                    Some(notification) => notification,
                    None => break,
                },
            };
            // 错误已在 handle 内记录，单条失败不影响后续通知。
            let _ = self.handle(notification).await;
        }
        debug!(target: "gw.pipeline", "pipeline_worker_stopped");
    }
}
