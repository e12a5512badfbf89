//! 层级访问与告警来源解析。

use std::sync::Arc;

use domain::WebApi;
use tracing::{debug, error, info, warn};

use crate::cache::HierarchyCache;
use crate::client::ConfigurationSource;
use crate::model::Hierarchy;

/// 刷新结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub node_count: usize,
}

/// 优先读缓存，缓存为空时依次向配置 API 拉取。
pub struct ConfigurationAccessor {
    cache: Arc<HierarchyCache>,
    source: Arc<dyn ConfigurationSource>,
    apis: Vec<WebApi>,
}

impl ConfigurationAccessor {
    pub fn new(cache: Arc<HierarchyCache>, source: Arc<dyn ConfigurationSource>, apis: Vec<WebApi>) -> Self {
        Self { cache, source, apis }
    }

    pub fn cache(&self) -> &Arc<HierarchyCache> {
        &self.cache
    }

    pub async fn get(&self) -> Option<Arc<Hierarchy>> {
        if let Some(hierarchy) = self.cache.get() {
            debug!(target: "gw.hierarchy", "hierarchy_cache_hit");
            return Some(hierarchy);
        }
        for api in &self.apis {
            if let Some(hierarchy) = self.pull(api).await {
                return Some(hierarchy);
            }
        }
        None
    }

    /// 强制从全部配置 API 拉取；每个成功的载荷依次替换缓存。
    pub async fn refresh(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        for api in &self.apis {
            match self.pull(api).await {
                Some(hierarchy) => {
                    report.node_count = hierarchy.len();
                    report.refreshed.push(api.name.clone());
                }
                None => report.failed.push(api.name.clone()),
            }
        }
        report
    }

    async fn pull(&self, api: &WebApi) -> Option<Arc<Hierarchy>> {
        let payload = match self.source.fetch(api).await {
            Ok(payload) => payload,
            Err(err) => {
                error!(target: "gw.hierarchy", api = %api.name, error = %err, "hierarchy_fetch_failed");
                return None;
            }
        };
        match self.cache.update(&payload) {
            Ok(hierarchy) => Some(hierarchy),
            Err(err) => {
                error!(target: "gw.hierarchy", api = %api.name, error = %err, "hierarchy_payload_rejected");
                None
            }
        }
    }
}

/// 把告警来源名称解析为层级 ID 路径。
pub struct SourceResolver {
    accessor: Arc<ConfigurationAccessor>,
    fallback_source_id: String,
}

impl SourceResolver {
    pub fn new(accessor: Arc<ConfigurationAccessor>, fallback_source_id: impl Into<String>) -> Self {
        Self {
            accessor,
            fallback_source_id: fallback_source_id.into(),
        }
    }

    /// 按 `fullNamePath` 排序后取第一个以 `.{name}` 结尾的节点；
    /// 否则取 ID 等于回退来源 ID 的节点；都没有时返回回退来源 ID。
    pub async fn resolve(&self, source: &str) -> String {
        let Some(hierarchy) = self.accessor.get().await else {
            error!(target: "gw.hierarchy", source = %source, "hierarchy_unavailable");
            return self.fallback();
        };
        let nodes = hierarchy.sorted_by_name_path();
        let suffix = format!(".{}", source);
        if let Some(node) = nodes.iter().find(|node| node.full_name_path.ends_with(&suffix)) {
            info!(target: "gw.hierarchy", source = %source, path = %node.full_name_path, "source_resolved");
            return node.full_id_path.clone();
        }
        if let Some(node) = nodes
            .iter()
            .find(|node| node.id.to_string() == self.fallback_source_id)
        {
            info!(target: "gw.hierarchy", source = %source, path = %node.full_name_path, "source_resolved_to_fallback_node");
            return node.full_id_path.clone();
        }
        self.fallback()
    }

    fn fallback(&self) -> String {
        warn!(target: "gw.hierarchy", fallback = %self.fallback_source_id, "source_fallback_used");
        self.fallback_source_id.clone()
    }
}
