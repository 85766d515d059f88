//! # HPL SECS/GEM 驱动
//!
//! 通过 TCP 与半导体设备通信（SECS-II 报文、HSMS 风格帧），完成通信握手、
//! 周期轮询状态变量与设备常量、接收告警与事件报告，并把值推送给宿主。
//!
//! ## 架构
//!
//! ```text
//!   HplSecsGem (start/stop/restart/write_data)
//!        │ mpsc Command
//!        ▼
//!   Reactor 任务 ── select! ── TcpStream 读 / 建连 / 最近定时器 / 命令
//!        │ 事件
//!        ▼
//!   Session (sans-IO) ── FrameBuffer → Inbound → dispatch / 状态处理
//!        │ Action
//!        ▼
//!   Send / Close / Publish → DataSink / Raise|Clear → AlertSink / 状态 → ConfigStore
//! ```
//!
//! ## 模块说明
//!
//! - [`item`]：SECS-II 数据项编解码
//! - [`frame`]：长度前缀帧重组
//! - [`message`]：报文头与出站编码
//! - [`mapper`]：变量划分与报告定义请求体
//! - [`convert`]：值转换
//! - [`session`]：协议状态机；连接管理与异步消息分别在 `connection`、`dispatch`
//! - [`driver`]：生命周期与反应器
//!
//! 约定：本驱动定义的报告 ID 总是等于其 CEID，每个 CEID 一个报告。

pub mod alarm;
pub mod alerts;
mod connection;
pub mod convert;
mod dispatch;
pub mod driver;
mod error;
pub mod frame;
pub mod item;
pub mod mapper;
pub mod message;
pub mod session;
pub mod state;
pub mod timers;

pub use connection::{LinkState, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY};
pub use driver::{DEFAULT_CONNECT_TIMEOUT, HplSecsGem};
pub use error::SecsError;
pub use item::{SecsItem, SecsValue};
pub use mapper::VariableMap;
pub use session::{Action, Session, SessionSettings};
