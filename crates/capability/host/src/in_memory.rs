//! 协作者内存实现（用于测试与独立网关进程）。

use crate::error::HostError;
use crate::traits::{Alert, AlertSink, AlertTemplate, ConfigStore, DataSink};
use async_trait::async_trait;
use domain::{MachineInfo, Variable, VariableValue};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// 当前处于触发状态的告警
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAlert {
    pub key: String,
    pub msg: String,
    pub description: String,
}

/// 内存告警表
pub struct InMemoryAlertSink {
    templates: RwLock<HashMap<String, AlertTemplate>>,
    active: RwLock<HashMap<String, ActiveAlert>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active
            .read()
            .map(|active| active.contains_key(key))
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<ActiveAlert> {
        self.active
            .read()
            .ok()
            .and_then(|active| active.get(key).cloned())
    }

    /// 当前告警 key（排序后）
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .active
            .read()
            .map(|active| active.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn template(&self, key: &str) -> Option<AlertTemplate> {
        self.templates
            .read()
            .ok()
            .and_then(|templates| templates.get(key).cloned())
    }
}

impl Default for InMemoryAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn pre_load(&self, templates: Vec<AlertTemplate>) {
        if let Ok(mut map) = self.templates.write() {
            for template in templates {
                map.insert(template.key.clone(), template);
            }
        }
    }

    async fn raise(&self, alert: Alert) {
        let template = self.template(&alert.key);
        let msg = alert
            .msg
            .clone()
            .or_else(|| template.as_ref().map(|t| t.msg.clone()))
            .unwrap_or_else(|| alert.key.clone());
        let description = alert
            .description
            .clone()
            .or_else(|| {
                template
                    .as_ref()
                    .map(|t| t.render(alert.error_msg.as_deref()))
            })
            .unwrap_or_default();

        let Ok(mut active) = self.active.write() else {
            return;
        };
        let entry = ActiveAlert {
            key: alert.key.clone(),
            msg,
            description,
        };
        if active.get(&alert.key) != Some(&entry) {
            warn!(key = %entry.key, msg = %entry.msg, description = %entry.description, "alert raised");
            active.insert(alert.key, entry);
        }
    }

    async fn clear(&self, key: &str) {
        if let Ok(mut active) = self.active.write() {
            if active.remove(key).is_some() {
                info!(key = %key, "alert cleared");
            }
        }
    }

    async fn clear_all(&self) -> Result<(), HostError> {
        let mut active = self.active.write().map_err(|_| HostError::Lock)?;
        active.clear();
        Ok(())
    }
}

/// 内存配置存储
pub struct InMemoryConfigStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn set(&self, path: &str, value: serde_json::Value) -> Result<(), HostError> {
        let mut values = self.values.write().map_err(|_| HostError::Lock)?;
        values.insert(path.to_string(), value);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>, HostError> {
        let values = self.values.read().map_err(|_| HostError::Lock)?;
        Ok(values.get(path).cloned())
    }
}

/// 一次数据写入
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub machine: String,
    pub variable: String,
    pub value: VariableValue,
}

/// 将写入转发到通道的数据回调
///
/// `set_failing(true)` 后所有写入返回错误，用于验证 database-error 告警。
pub struct ChannelDataSink {
    tx: mpsc::UnboundedSender<DataRecord>,
    failing: AtomicBool,
}

impl ChannelDataSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DataRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                failing: AtomicBool::new(false),
            },
            rx,
        )
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl DataSink for ChannelDataSink {
    async fn write(
        &self,
        machine: &MachineInfo,
        variable: &Variable,
        value: VariableValue,
    ) -> Result<(), HostError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(HostError::Write("sink unavailable".to_string()));
        }
        self.tx
            .send(DataRecord {
                machine: machine.name.clone(),
                variable: variable.name.clone(),
                value,
            })
            .map_err(|_| HostError::Write("receiver dropped".to_string()))
    }
}
