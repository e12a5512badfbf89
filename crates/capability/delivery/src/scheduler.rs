//! 暂存重投调度器。
//!
//! 状态机：`Stopped → Running ⇄ Executing`，`request_stop` 进入 `StopRequested`，
//! 在下一个 tick 边界退出后回到 `Stopped`；只有 `Stopped` 状态可以重新启动。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::queue::{DeliveryOutcome, DeliveryQueue};

/// 后台任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Stopped,
    Running,
    Executing,
    StopRequested,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Stopped => "Stopped",
            WorkerStatus::Running => "Running",
            WorkerStatus::Executing => "Executing",
            WorkerStatus::StopRequested => "StopRequested",
        }
    }
}

struct SchedulerState {
    status: WorkerStatus,
    stop: Option<CancellationToken>,
}

/// 一次 tick 的结果
#[derive(Debug, Default)]
pub struct TickReport {
    pub outcomes: Vec<DeliveryOutcome>,
    pub failed_apis: usize,
}

impl TickReport {
    pub fn is_failed(&self) -> bool {
        self.failed_apis > 0
    }
}

pub struct Scheduler {
    queue: Arc<DeliveryQueue>,
    interval: Duration,
    shutdown: CancellationToken,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub const NAME: &'static str = "scheduler";

    pub fn new(queue: Arc<DeliveryQueue>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            queue,
            interval,
            shutdown,
            state: Mutex::new(SchedulerState {
                status: WorkerStatus::Stopped,
                stop: None,
            }),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        self.lock_state().status
    }

    /// 仅在 `Stopped` 时启动后台循环；启动后立即执行第一次 tick。
    pub fn start(self: &Arc<Self>) -> bool {
        let stop = {
            let mut state = self.lock_state();
            if state.status != WorkerStatus::Stopped || self.shutdown.is_cancelled() {
                return false;
            }
            let stop = self.shutdown.child_token();
            state.status = WorkerStatus::Running;
            state.stop = Some(stop.clone());
            stop
        };
        info!(target: "gw.delivery", interval_ms = self.interval.as_millis() as u64, "scheduler_started");
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run(stop).await });
        true
    }

    /// 请求停止；当前 tick 执行完后退出。
    pub fn request_stop(&self) -> bool {
        let mut state = self.lock_state();
        match state.status {
            WorkerStatus::Running | WorkerStatus::Executing => {
                state.status = WorkerStatus::StopRequested;
                if let Some(stop) = &state.stop {
                    stop.cancel();
                }
                info!(target: "gw.delivery", "scheduler_stop_requested");
                true
            }
            WorkerStatus::StopRequested | WorkerStatus::Stopped => false,
        }
    }

    /// 执行一次重投：列出所有 API 的暂存记录并重新发送。
    pub async fn tick(&self) -> TickReport {
        let (outcomes, errors) = self.queue.send_all_stored().await;
        let report = TickReport {
            outcomes,
            failed_apis: errors.len(),
        };
        gw_telemetry::record_scheduler_tick(report.is_failed());
        report
    }

    async fn run(self: Arc<Self>, stop: CancellationToken) {
        loop {
            if stop.is_cancelled() || !self.transition(WorkerStatus::Running, WorkerStatus::Executing) {
                break;
            }
            let report = self.tick().await;
            if report.is_failed() {
                warn!(target: "gw.delivery", failed_apis = report.failed_apis, "scheduler_tick_failed");
            }
            let attempted: usize = report.outcomes.iter().map(|outcome| outcome.attempted).sum();
            if attempted > 0 {
                let delivered: usize = report.outcomes.iter().map(|outcome| outcome.delivered).sum();
                info!(target: "gw.delivery", attempted, delivered, "scheduler_tick_completed");
            }
            self.transition(WorkerStatus::Executing, WorkerStatus::Running);

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        let mut state = self.lock_state();
        state.status = WorkerStatus::Stopped;
        state.stop = None;
        info!(target: "gw.delivery", "scheduler_stopped");
    }

    fn transition(&self, from: WorkerStatus, to: WorkerStatus) -> bool {
        let mut state = self.lock_state();
        if state.status != from {
            return false;
        }
        state.status = to;
        true
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
