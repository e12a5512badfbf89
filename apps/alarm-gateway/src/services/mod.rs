//! 后台任务与跨 crate 适配。

mod adapters;
mod event_worker;

pub use adapters::{DeliveryRecordSink, HierarchySourceLookup};
pub use event_worker::EventWorker;
