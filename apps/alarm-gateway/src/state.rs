//! 共享应用状态（各 handler 通过 `State` 提取）。

use std::sync::Arc;

use gw_delivery::{DeliveryQueue, Scheduler};
use gw_hierarchy::ConfigurationAccessor;
use gw_pipeline::EventPipeline;
use gw_protocol::{ProtocolSession, TypeBrowser};

use crate::services::EventWorker;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<ProtocolSession>,
    pub browser: TypeBrowser,
    pub pipeline: Arc<EventPipeline>,
    pub queue: Arc<DeliveryQueue>,
    pub scheduler: Arc<Scheduler>,
    pub event_worker: Arc<EventWorker>,
    pub accessor: Arc<ConfigurationAccessor>,
}
