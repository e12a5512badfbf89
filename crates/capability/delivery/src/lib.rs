//! 告警下游投递能力。
//!
//! - `transport`：单次 HTTP 发送（`POST AddAlarmUrl`）
//! - `retry`：瞬时错误的抖动退避重试
//! - `queue`：立即发送 + 失败落盘 + 成功删盘（至少一次投递）
//! - `scheduler`：周期重投磁盘暂存记录

pub mod error;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod transport;

pub use error::DeliveryError;
pub use queue::{DeliveryOutcome, DeliveryQueue};
pub use retry::{DeliveryReport, RetryPolicy, send_with_retry};
pub use scheduler::{Scheduler, TickReport, WorkerStatus};
pub use transport::{AlarmTransport, HttpAlarmTransport};
