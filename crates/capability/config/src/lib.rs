//! 应用运行配置加载。
//!
//! 配置只在启动时读取并校验一次，之后以不可变值传入各组件构造函数。

use domain::{GET_CONFIGURATION_ROUTE, WebApi, is_valid_queue_name};
use std::collections::HashSet;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 自动化服务器连接配置。
#[derive(Debug, Clone)]
pub struct OpcUaConfig {
    pub server_url: String,
    pub use_security: bool,
    pub auto_accept_untrusted: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_ms: u64,
    /// 0 表示禁用自动重连。
    pub reconnect_period_ms: u64,
    pub session_lifetime_ms: u64,
    pub connect_poll_ms: u64,
    pub subscriptions: Vec<String>,
    pub fields: Vec<String>,
    pub simulated: bool,
}

/// 告警处理配置。
#[derive(Debug, Clone)]
pub struct AlarmConfig {
    pub auto_acknowledge: bool,
    pub acknowledge_message: String,
    pub fallback_source_id: String,
    pub fallback_source_system_id: String,
}

/// 下游投递配置。
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub cache_location: String,
    pub retry_count: u32,
    pub first_retry_delay_ms: u64,
    pub schedule_interval_seconds: u64,
    pub web_apis: Vec<WebApi>,
    /// 拉取组织层级配置的 API 名称列表。
    pub update_configuration_web_apis: Vec<String>,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub opcua: OpcUaConfig,
    pub alarm: AlarmConfig,
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("GW_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let server_url = read_optional("GW_OPCUA_SERVER_URL")
            .ok_or_else(|| ConfigError::Missing("GW_OPCUA_SERVER_URL".to_string()))?;

        let opcua = OpcUaConfig {
            server_url,
            use_security: read_bool_with_default("GW_OPCUA_USE_SECURITY", false),
            auto_accept_untrusted: read_bool_with_default("GW_OPCUA_AUTO_ACCEPT", false),
            username: read_optional("GW_OPCUA_USERNAME"),
            password: read_optional("GW_OPCUA_PASSWORD"),
            keep_alive_ms: read_u64_with_default("GW_OPCUA_KEEPALIVE_MS", 5_000)?,
            reconnect_period_ms: read_u64_with_default("GW_OPCUA_RECONNECT_MS", 10_000)?,
            session_lifetime_ms: read_u64_with_default("GW_OPCUA_SESSION_LIFETIME_MS", 30_000)?,
            connect_poll_ms: read_u64_with_default("GW_OPCUA_CONNECT_POLL_MS", 5_000)?,
            subscriptions: read_list_with_default("GW_OPCUA_SUBSCRIPTIONS", &["Alarms"]),
            fields: read_list_with_default("GW_OPCUA_FIELDS", &[]),
            simulated: read_bool_with_default("GW_OPCUA_SIMULATED", false),
        };

        let alarm = AlarmConfig {
            auto_acknowledge: read_bool_with_default("GW_AUTO_ACKNOWLEDGE", true),
            acknowledge_message: env::var("GW_ACK_MESSAGE")
                .unwrap_or_else(|_| "Auto Acknowledged".to_string()),
            fallback_source_id: env::var("GW_FALLBACK_SOURCE_ID").unwrap_or_default(),
            fallback_source_system_id: env::var("GW_FALLBACK_SOURCE_SYSTEM_ID").unwrap_or_default(),
        };

        let delivery = DeliveryConfig {
            cache_location: env::var("GW_CACHE_LOCATION").unwrap_or_else(|_| "./cache".to_string()),
            retry_count: read_u32_with_default("GW_DELIVERY_RETRY", 3)?,
            first_retry_delay_ms: read_u64_with_default("GW_DELIVERY_FIRST_RETRY_DELAY_MS", 1_000)?,
            schedule_interval_seconds: read_u64_with_default("GW_SCHEDULE_INTERVAL_SECONDS", 60)?,
            web_apis: read_web_apis("GW_WEB_APIS")?,
            update_configuration_web_apis: read_list_with_default(
                "GW_UPDATE_CONFIGURATION_WEB_APIS",
                &[],
            ),
        };

        let config = Self {
            http_addr,
            opcua,
            alarm,
            delivery,
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验跨字段约束。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery.schedule_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "GW_SCHEDULE_INTERVAL_SECONDS".to_string(),
                "0".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for api in &self.delivery.web_apis {
            if api.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "GW_WEB_APIS".to_string(),
                    "web api name is empty".to_string(),
                ));
            }
            // 名称即暂存目录名。
            if !is_valid_queue_name(&api.name) {
                return Err(ConfigError::Invalid(
                    "GW_WEB_APIS".to_string(),
                    format!("web api name {:?} is not a valid directory name", api.name),
                ));
            }
            if api.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "GW_WEB_APIS".to_string(),
                    format!("baseUrl is empty for {}", api.name),
                ));
            }
            if !names.insert(api.name.as_str()) {
                return Err(ConfigError::Invalid(
                    "GW_WEB_APIS".to_string(),
                    format!("duplicate web api name {}", api.name),
                ));
            }
        }
        for name in &self.delivery.update_configuration_web_apis {
            let api = self.find_web_api(name).ok_or_else(|| {
                ConfigError::Invalid(
                    "GW_UPDATE_CONFIGURATION_WEB_APIS".to_string(),
                    format!("unknown web api {}", name),
                )
            })?;
            if !api.has_route(GET_CONFIGURATION_ROUTE) {
                return Err(ConfigError::Invalid(
                    "GW_UPDATE_CONFIGURATION_WEB_APIS".to_string(),
                    format!("{} has no {}", name, GET_CONFIGURATION_ROUTE),
                ));
            }
        }
        Ok(())
    }

    pub fn find_web_api(&self, name: &str) -> Option<&WebApi> {
        self.delivery.web_apis.iter().find(|api| api.name == name)
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}

/// 逗号分隔列表；未设置时使用默认值，设置为空串时为空列表。
fn read_list_with_default(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(value) => split_list(&value),
        Err(_) => default.iter().map(|item| item.to_string()).collect(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_web_apis(key: &str) -> Result<Vec<WebApi>, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(Vec::new()),
    };
    serde_json::from_str::<Vec<WebApi>>(&value)
        .map_err(|err| ConfigError::Invalid(key.to_string(), err.to_string()))
}
