//! # 组织层级模块
//!
//! 告警的 `source` 字段是组织层级中的 ID 路径，由来源名称（SourceName）解析得到。
//!
//! - [`client`]：从配置服务拉取层级载荷
//! - [`model`]：载荷解析与展平
//! - [`cache`]：进程内缓存
//! - [`resolver`]：缓存优先的访问器与来源解析

pub mod cache;
pub mod client;
pub mod error;
pub mod model;
pub mod resolver;

pub use cache::HierarchyCache;
pub use client::{ConfigurationClient, ConfigurationSource};
pub use error::HierarchyError;
pub use model::{Hierarchy, HierarchyLevel, HierarchyNode};
pub use resolver::{ConfigurationAccessor, RefreshReport, SourceResolver};
