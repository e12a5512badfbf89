//! # 告警暂存模块
//!
//! 下游投递失败的告警记录在本地磁盘暂存，由调度器周期性重投。
//!
//! ## 模块说明
//!
//! - [`traits`]：`AlarmStorage` 接口（list / store / delete）
//! - [`file`]：文件系统实现，目录布局 `{root}/{api}/ALM_{id}.json`
//! - [`in_memory`]：内存实现（测试使用）
//! - [`validation`]：API 名称校验（作为目录名）
//! - [`error`]：存储错误类型
//!
//! ## 并发约束
//!
//! - 写入是“不存在才创建”，同一记录至多一份文件
//! - 删除是幂等的，重复删除返回 `false`
//! - 不需要跨进程文件锁；同一记录的并发写入不会产生半截文件
//!
//! ```rust,ignore
//! use gw_storage::{AlarmStorage, FileAlarmStorage};
//!
//! let storage = FileAlarmStorage::new("./cache");
//! storage.store("ApiA", &record).await?;
//! let pending = storage.list("ApiA").await?;
//! storage.delete("ApiA", record.id).await?;
//! ```

pub mod error;
pub mod file;
pub mod in_memory;
pub mod traits;
pub mod validation;

pub use error::*;
pub use file::FileAlarmStorage;
pub use in_memory::InMemoryAlarmStorage;
pub use traits::*;
pub use validation::*;
