//! 流水线接口到投递队列、层级解析的适配。

use std::sync::Arc;

use async_trait::async_trait;
use domain::AlarmRecord;
use gw_delivery::DeliveryQueue;
use gw_hierarchy::SourceResolver;
use gw_pipeline::{AlarmRecordSink, SourceLookup};

/// 新告警交给投递队列（所有配置了新增路由的 API）。
pub struct DeliveryRecordSink {
    queue: Arc<DeliveryQueue>,
}

impl DeliveryRecordSink {
    pub fn new(queue: Arc<DeliveryQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl AlarmRecordSink for DeliveryRecordSink {
    async fn publish(&self, records: Vec<AlarmRecord>) {
        self.queue.publish_to_all(&records).await;
    }
}

pub struct HierarchySourceLookup {
    resolver: SourceResolver,
}

impl HierarchySourceLookup {
    pub fn new(resolver: SourceResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl SourceLookup for HierarchySourceLookup {
    async fn resolve(&self, source_name: &str) -> String {
        self.resolver.resolve(source_name).await
    }
}
