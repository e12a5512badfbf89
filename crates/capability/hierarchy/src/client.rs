//! 配置服务客户端。
//!
//! `POST {baseUrl}{GetConfigurationUrl}`，请求体为空 JSON 字符串（服务端要求 Content-Type）；
//! 响应体原样作为层级载荷。

use std::time::Duration;

use async_trait::async_trait;
use domain::WebApi;

use crate::error::HierarchyError;

/// 层级载荷来源
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    async fn fetch(&self, api: &WebApi) -> Result<String, HierarchyError>;
}

#[derive(Debug, Clone)]
pub struct ConfigurationClient {
    client: reqwest::Client,
}

impl ConfigurationClient {
    pub fn new(timeout: Duration) -> Result<Self, HierarchyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| HierarchyError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ConfigurationSource for ConfigurationClient {
    async fn fetch(&self, api: &WebApi) -> Result<String, HierarchyError> {
        let url = api
            .configuration_url()
            .ok_or_else(|| HierarchyError::NoConfigurationRoute(api.name.clone()))?;
        let mut request = self.client.post(&url).json(&"");
        for (key, value) in &api.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|err| HierarchyError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| HierarchyError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(HierarchyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
