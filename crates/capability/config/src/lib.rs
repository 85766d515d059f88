//! 网关运行配置加载。

use domain::Machine;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("failed to read machine definition {0}: {1}")]
    Read(String, String),
    #[error("invalid machine definition {0}: {1}")]
    Machine(String, String),
}

/// 网关运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 机台定义 JSON 文件路径
    pub machine_file: String,
    /// TCP 建连超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 覆盖机台定义中的设备地址
    pub ip_address: Option<String>,
    /// 覆盖机台定义中的设备端口
    pub port: Option<u16>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let machine_file = env::var("HPL_MACHINE_FILE")
            .map_err(|_| ConfigError::Missing("HPL_MACHINE_FILE".to_string()))?;
        let connect_timeout_ms = read_u64_with_default("HPL_CONNECT_TIMEOUT_MS", 5000)?;
        let ip_address = read_optional("HPL_IP_ADDRESS");
        let port = read_optional_u16("HPL_PORT")?;

        Ok(Self {
            machine_file,
            connect_timeout_ms,
            ip_address,
            port,
        })
    }

    /// 读取机台定义并应用地址覆盖。
    pub fn load_machine(&self) -> Result<Machine, ConfigError> {
        let json = std::fs::read_to_string(&self.machine_file)
            .map_err(|e| ConfigError::Read(self.machine_file.clone(), e.to_string()))?;
        let mut machine = Machine::from_json(&json)
            .map_err(|e| ConfigError::Machine(self.machine_file.clone(), e.to_string()))?;
        if let Some(ip_address) = &self.ip_address {
            machine.settings.model.ip_address = ip_address.clone();
        }
        if let Some(port) = self.port {
            machine.settings.model.port = port;
        }
        Ok(machine)
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_u16(key: &str) -> Result<Option<u16>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => value
            .parse::<u16>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(None),
    }
}
