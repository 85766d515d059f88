//! 机台领域模型：机台定义、变量定义与变量值。
//!
//! 由宿主进程提供的机台定义 JSON 反序列化而来，驱动启动时读取一次，
//! 之后只在 `update_model`/`restart` 时替换。

pub mod data;
pub mod machine;

pub use data::VariableValue;
pub use machine::{
    Access, Machine, MachineInfo, MachineModel, MachineSettings, Variable, VariableFormat,
    VariableKind,
};
