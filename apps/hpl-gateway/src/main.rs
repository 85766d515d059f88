//! 独立网关进程：加载一个机台定义并运行其 SECS/GEM 驱动。
//!
//! 变量值以结构化日志输出；重连耗尽时以非零状态退出，由进程管理器重启。

use async_trait::async_trait;
use domain::{MachineInfo, Variable, VariableValue};
use hpl_config::AppConfig;
use hpl_host::in_memory::{InMemoryAlertSink, InMemoryConfigStore};
use hpl_host::{DataSink, HostError};
use hpl_secs_gem::HplSecsGem;
use hpl_telemetry::init_tracing;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 把变量值写入日志的数据回调
struct LogDataSink;

#[async_trait]
impl DataSink for LogDataSink {
    async fn write(
        &self,
        machine: &MachineInfo,
        variable: &Variable,
        value: VariableValue,
    ) -> Result<(), HostError> {
        info!(
            target: "hpl.data",
            machine = %machine.name,
            variable = %variable.name,
            value = %value,
            "variable value"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 初始化结构化日志
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("gateway stopped: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    let machine = config.load_machine()?;
    info!(
        machine = %machine.info.name,
        address = %machine.settings.model.ip_address,
        port = machine.settings.model.port,
        "machine definition loaded"
    );

    let alerts = Arc::new(InMemoryAlertSink::new());
    let conf = Arc::new(InMemoryConfigStore::new());
    let mut driver = HplSecsGem::new(machine, alerts, conf)
        .await
        .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    driver.start(Arc::new(LogDataSink)).await?;

    if !driver.is_running() {
        info!("machine disabled, waiting for shutdown signal");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let finished = tokio::select! {
        result = driver.wait() => Some(result),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
    };
    match finished {
        // 重连耗尽：交由进程管理器重启
        Some(result) => result?,
        None => {
            info!("shutdown signal received");
            driver.stop().await?;
        }
    }

    let snapshot = hpl_telemetry::metrics().snapshot();
    info!(
        frames_received = snapshot.frames_received,
        frames_sent = snapshot.frames_sent,
        request_timeouts = snapshot.request_timeouts,
        reconnect_attempts = snapshot.reconnect_attempts,
        "gateway exiting"
    );
    Ok(())
}
