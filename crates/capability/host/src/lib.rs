//! # 宿主协作接口
//!
//! HPL 驱动由宿主进程构造，宿主提供三类协作者：
//! - `AlertSink`：告警门面（preLoad / raise / clear / clearAll），按 key 幂等
//! - `ConfigStore`：键值配置存储，驱动用它发布连接状态
//! - `DataSink`：逐变量的数据写入回调
//!
//! `in_memory` 中的实现用于测试与独立运行的网关进程。

mod error;
pub mod in_memory;
mod traits;

pub use error::HostError;
pub use traits::{Alert, AlertSink, AlertTemplate, ConfigStore, DataSink};
