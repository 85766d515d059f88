//! 协作者 Trait 定义
//!
//! 设计原则：
//! - 所有接口使用 async_trait 支持动态分发
//! - 告警按 key 幂等：重复 raise 同一 key 不产生新状态，clear 未设置的 key 是安全的

use crate::error::HostError;
use async_trait::async_trait;
use domain::{MachineInfo, Variable, VariableValue};

/// 预加载的告警模板
///
/// `description` 中的 `{error}` 在 raise 时替换为告警携带的错误信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTemplate {
    pub key: String,
    pub msg: String,
    pub description: String,
}

impl AlertTemplate {
    pub fn new(
        key: impl Into<String>,
        msg: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            msg: msg.into(),
            description: description.into(),
        }
    }

    /// 用错误信息渲染描述
    pub fn render(&self, error_msg: Option<&str>) -> String {
        self.description.replace("{error}", error_msg.unwrap_or(""))
    }
}

/// 一次告警
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub key: String,
    /// 对应模板中的 `{error}`
    pub error_msg: Option<String>,
    /// 无模板的动态告警直接携带文本
    pub msg: Option<String>,
    pub description: Option<String>,
}

impl Alert {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            error_msg: None,
            msg: None,
            description: None,
        }
    }

    pub fn with_error(mut self, error_msg: impl Into<String>) -> Self {
        self.error_msg = Some(error_msg.into());
        self
    }

    pub fn with_text(mut self, msg: impl Into<String>, description: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self.description = Some(description.into());
        self
    }
}

/// 告警门面
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// 预加载已知 key 的告警模板
    async fn pre_load(&self, templates: Vec<AlertTemplate>);

    /// 触发告警（幂等）
    async fn raise(&self, alert: Alert);

    /// 清除告警（未设置时为空操作）
    async fn clear(&self, key: &str);

    /// 清除全部告警
    async fn clear_all(&self) -> Result<(), HostError>;
}

/// 键值配置存储
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn set(&self, path: &str, value: serde_json::Value) -> Result<(), HostError>;

    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>, HostError>;
}

/// 逐变量数据写入回调
#[async_trait]
pub trait DataSink: Send + Sync {
    async fn write(
        &self,
        machine: &MachineInfo,
        variable: &Variable,
        value: VariableValue,
    ) -> Result<(), HostError>;
}
