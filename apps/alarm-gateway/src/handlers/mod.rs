//! Handlers 模块

pub mod alarms;
pub mod configuration;
pub mod health;
pub mod ua;
pub mod workers;

pub use alarms::*;
pub use configuration::*;
pub use health::*;
pub use ua::*;
pub use workers::*;
