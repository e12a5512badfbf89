//! 下游 HTTP 传输。
//!
//! `POST {baseUrl}{urlPrefix}{AddAlarmUrl}`，JSON 请求体为告警记录；2xx 视为成功。

use std::time::Duration;

use async_trait::async_trait;
use domain::{AlarmRecord, WebApi};

use crate::error::DeliveryError;

/// 单次发送（不含重试）。
#[async_trait]
pub trait AlarmTransport: Send + Sync {
    async fn send(&self, api: &WebApi, record: &AlarmRecord) -> Result<(), DeliveryError>;
}

/// reqwest 实现
#[derive(Debug, Clone)]
pub struct HttpAlarmTransport {
    client: reqwest::Client,
}

impl HttpAlarmTransport {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlarmTransport for HttpAlarmTransport {
    async fn send(&self, api: &WebApi, record: &AlarmRecord) -> Result<(), DeliveryError> {
        let url = api
            .add_alarm_url()
            .ok_or_else(|| DeliveryError::NoAddRoute(api.name.clone()))?;
        let mut request = self.client.post(&url).json(record);
        for (key, value) in &api.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let body = if body.trim().is_empty() {
            status
                .canonical_reason()
                .map(|reason| format!("{} - {}", status.as_u16(), reason))
                .unwrap_or_else(|| status.as_u16().to_string())
        } else {
            body
        };
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
