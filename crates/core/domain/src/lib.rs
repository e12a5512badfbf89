//! 告警网关核心领域模型。
//!
//! 所有能力模块共享的数据结构：
//! - `AlarmRecord`：告警的传输/持久化形态（下游 API 请求体 = 磁盘队列文件内容）
//! - `WebApi`：下游 Web API 描述（地址、路由、请求头）

pub mod alarm;
pub mod web_api;

pub use alarm::{ALARM_TIME_FORMAT, AlarmRecord, format_alarm_time};
pub use web_api::{ADD_ALARM_ROUTE, GET_CONFIGURATION_ROUTE, WebApi, is_valid_queue_name};
