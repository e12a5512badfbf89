//! alarm-events 后台任务。
//!
//! 轮询循环：会话断开时重新连接（重连进行中则等待），会话代数变化时重建订阅；
//! 通知经有界队列交给流水线工作任务串行处理。
//! 应用证书无效是唯一让循环退出并返回错误的情况。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gw_delivery::WorkerStatus;
use gw_pipeline::EventPipeline;
use gw_protocol::{NotificationSink, ProtocolError, ProtocolSession, SessionState, SubscriptionManager};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct EventWorker {
    session: Arc<ProtocolSession>,
    subscriptions: SubscriptionManager,
    pipeline: Arc<EventPipeline>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    status: Mutex<WorkerStatus>,
}

impl EventWorker {
    pub const NAME: &'static str = "alarm-events";

    pub fn new(
        session: Arc<ProtocolSession>,
        subscriptions: SubscriptionManager,
        pipeline: Arc<EventPipeline>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            subscriptions,
            pipeline,
            poll_interval,
            shutdown,
            status: Mutex::new(WorkerStatus::Stopped),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn run(self: Arc<Self>) -> Result<(), ProtocolError> {
        let (queue, rx) = self.pipeline.queue();
        let sink: Arc<dyn NotificationSink> = Arc::new(queue);
        let pipeline_cancel = self.shutdown.child_token();
        let pipeline_task = tokio::spawn(self.pipeline.clone().run(rx, pipeline_cancel.clone()));
        self.set_status(WorkerStatus::Running);
        info!(target: "gw.app", worker = Self::NAME, "worker_started");

        let result = loop {
            if self.shutdown.is_cancelled() {
                break Ok(());
            }
            self.set_status(WorkerStatus::Executing);
            let polled = self.poll_once(&sink).await;
            self.set_status(WorkerStatus::Running);
            if let Err(err) = polled {
                break Err(err);
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        };

        self.set_status(WorkerStatus::StopRequested);
        pipeline_cancel.cancel();
        let _ = pipeline_task.await;
        self.set_status(WorkerStatus::Stopped);
        info!(target: "gw.app", worker = Self::NAME, "worker_stopped");
        result
    }

    /// 一次轮询；只有致命证书错误向上返回。
    pub async fn poll_once(&self, sink: &Arc<dyn NotificationSink>) -> Result<(), ProtocolError> {
        match self.session.state() {
            SessionState::Connected => {}
            SessionState::Reconnecting | SessionState::Connecting => return Ok(()),
            SessionState::Disconnected => match self.session.try_connect().await {
                Ok(()) => {}
                Err(err) if err.is_fatal_certificate() => return Err(err),
                Err(err) => {
                    warn!(target: "gw.app", error = %err, "session_poll_connect_failed");
                    return Ok(());
                }
            },
        }
        match self.subscriptions.ensure(&self.session, sink.clone()).await {
            Ok(true) => {
                info!(
                    target: "gw.app",
                    generation = self.session.generation(),
                    subscriptions = self.subscriptions.names().len(),
                    "subscriptions_ready"
                );
            }
            Ok(false) => {}
            Err(err) => warn!(target: "gw.app", error = %err, "subscription_setup_failed"),
        }
        Ok(())
    }

    fn set_status(&self, status: WorkerStatus) {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }
}
