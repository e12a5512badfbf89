//! 层级缓存（进程内，整体替换）。

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::error::HierarchyError;
use crate::model::Hierarchy;

#[derive(Debug, Default)]
pub struct HierarchyCache {
    current: RwLock<Option<Arc<Hierarchy>>>,
}

impl HierarchyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<Hierarchy>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 解析载荷并替换缓存；解析失败时保留原缓存。
    pub fn update(&self, payload: &str) -> Result<Arc<Hierarchy>, HierarchyError> {
        let hierarchy = Arc::new(Hierarchy::parse(payload)?);
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(hierarchy.clone());
        info!(target: "gw.hierarchy", node_count = hierarchy.len(), "hierarchy_cached");
        Ok(hierarchy)
    }
}
