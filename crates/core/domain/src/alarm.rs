//! 告警记录（传输形态）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 下游约定的时间格式：`yyyy-MM-ddTHH:mm:ss.fffZ`。
pub const ALARM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// 告警记录。
///
/// 创建后不可变；投递失败时原样写入磁盘，仅在下游确认成功后删除。
/// `id` 是稳定标识，下游据此去重（至少一次投递）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    #[serde(alias = "identifier")]
    pub id: Uuid,
    pub source_alarm_id: String,
    pub priority_id: i32,
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    pub source: String,
    pub source_property: String,
    #[serde(rename = "type", default)]
    pub alarm_type: Option<String>,
    #[serde(default)]
    pub alert_name: Option<String>,
    #[serde(default)]
    pub property_description: Option<String>,
    pub source_system_id: String,
    pub message: String,
}

impl AlarmRecord {
    /// 基于 EventId 十六进制生成稳定 ID（同一事件重复生成得到同一 ID）。
    pub fn stable_id(event_id_hex: &str) -> Uuid {
        let name = format!("alarm:event:{}", event_id_hex);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }
}

/// 按下游约定格式化时间。
pub fn format_alarm_time(time: DateTime<Utc>) -> String {
    time.format(ALARM_TIME_FORMAT).to_string()
}
