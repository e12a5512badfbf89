//! 下游 Web API 描述。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 新增告警路由键。
pub const ADD_ALARM_ROUTE: &str = "AddAlarmUrl";
/// 获取组织层级配置路由键。
pub const GET_CONFIGURATION_ROUTE: &str = "GetConfigurationUrl";

/// 下游 Web API 描述。
///
/// `name` 同时是磁盘队列的子目录名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebApi {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub url_prefix: Option<String>,
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// API 名称同时是暂存目录名：非空、无首尾空格、不以 `.` 开头、不含路径分隔符。
pub fn is_valid_queue_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.trim() == name
        && !name.starts_with('.')
        && !name.contains(['/', '\\', ':', '\0'])
}

impl WebApi {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            url_prefix: None,
            routes: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, key: impl Into<String>, route: impl Into<String>) -> Self {
        self.routes.insert(key.into(), route.into());
        self
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn has_route(&self, key: &str) -> bool {
        self.routes.contains_key(key)
    }

    /// 新增告警的完整 URL：`{base_url}{url_prefix}{AddAlarmUrl}`。
    pub fn add_alarm_url(&self) -> Option<String> {
        self.url_for(ADD_ALARM_ROUTE, true)
    }

    /// 组织层级配置的完整 URL（不带 url_prefix）。
    pub fn configuration_url(&self) -> Option<String> {
        self.url_for(GET_CONFIGURATION_ROUTE, false)
    }

    fn url_for(&self, key: &str, with_prefix: bool) -> Option<String> {
        let route = self.routes.get(key)?;
        let prefix = if with_prefix {
            self.url_prefix.as_deref().unwrap_or("")
        } else {
            ""
        };
        let path = format!("{}{}", prefix, route);
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            return Some(base.to_string());
        }
        Some(format!("{}/{}", base, path.trim_start_matches('/')))
    }
}
