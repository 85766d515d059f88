//! 机台定义（宿主下发的 machine JSON）。
//!
//! ```json
//! {
//!   "info": { "name": "press-01", "hpl": "secs-gem" },
//!   "settings": { "model": { "enable": true, "ipAddress": "10.0.0.8", "port": 5000 } },
//!   "variables": [
//!     { "name": "temp", "format": "float", "type": "Status Variable (SV)", "numericID": 1001 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// 机台定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub info: MachineInfo,
    #[serde(default)]
    pub settings: MachineSettings,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Machine {
    /// 从 JSON 字符串解析机台定义
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 连接状态在配置存储中的路径
    pub fn connection_status_path(&self) -> String {
        format!(
            "machines:{}:settings:model:connectionStatus",
            self.info.name
        )
    }
}

/// 机台基本信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineInfo {
    pub name: String,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hpl: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineSettings {
    #[serde(default)]
    pub model: MachineModel,
}

/// 驱动连接与轮询配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineModel {
    /// 是否启用
    #[serde(default)]
    pub enable: bool,
    /// 设备地址
    #[serde(default = "default_ip_address")]
    pub ip_address: String,
    /// 设备端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 本端设备 ID（控制消息与请求的 source id）
    #[serde(rename = "sparkDeviceID", default = "default_spark_device_id")]
    pub spark_device_id: u16,
    /// 设备端 device id
    #[serde(rename = "equipDeviceID", default)]
    pub equip_device_id: u16,
    /// 轮询间隔（秒）
    #[serde(default = "default_request_frequency")]
    pub request_frequency: u64,
    /// 是否周期发送 Linktest
    #[serde(default)]
    pub enable_periodic_link_test_messages: bool,
    /// Linktest 间隔（秒）
    #[serde(default = "default_link_test_frequency")]
    pub link_test_frequency: u64,
    /// 断线上报延迟（秒），缺省为立即上报
    #[serde(default)]
    pub disconnect_report_time: Option<u64>,
    /// 由驱动回写的连接状态
    #[serde(default)]
    pub connection_status: bool,
}

fn default_ip_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_spark_device_id() -> u16 {
    1
}

fn default_request_frequency() -> u64 {
    5
}

fn default_link_test_frequency() -> u64 {
    120
}

impl Default for MachineModel {
    fn default() -> Self {
        Self {
            enable: false,
            ip_address: default_ip_address(),
            port: default_port(),
            spark_device_id: default_spark_device_id(),
            equip_device_id: 0,
            request_frequency: default_request_frequency(),
            enable_periodic_link_test_messages: false,
            link_test_frequency: default_link_test_frequency(),
            disconnect_report_time: None,
            connection_status: false,
        }
    }
}

/// 变量定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub format: VariableFormat,
    #[serde(rename = "type", default)]
    pub kind: VariableKind,
    /// SVID 或 ECID
    #[serde(rename = "numericID", default)]
    pub numeric_id: Option<u32>,
    /// 采集事件 ID，存在时变量通过事件报告上报
    #[serde(rename = "CEID", default)]
    pub ceid: Option<u32>,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub array: bool,
    /// 纯连接状态变量，不参与轮询
    #[serde(rename = "machineConnected", default)]
    pub machine_connected: bool,
}

impl Variable {
    pub fn is_writable(&self) -> bool {
        self.access == Access::Write
    }
}

/// 变量数据格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableFormat {
    Char,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
}

impl VariableFormat {
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64)
    }
}

/// 变量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VariableKind {
    #[serde(rename = "Status Variable (SV)")]
    StatusVariable,
    #[serde(rename = "Equipment Constant (EC)")]
    EquipmentConstant,
    #[serde(rename = "Data Variable (DV) (requires CEID)")]
    DataVariable,
    #[serde(rename = "Active Alarm Codes")]
    ActiveAlarmCodes,
    #[serde(rename = "Active Alarm Texts")]
    ActiveAlarmTexts,
    #[default]
    #[serde(other)]
    Other,
}

/// 读写权限，未知取值按只读处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Write,
    #[default]
    #[serde(other)]
    Read,
}
