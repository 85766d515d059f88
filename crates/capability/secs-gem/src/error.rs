//! 驱动错误类型定义

/// SECS/GEM 驱动错误
#[derive(Debug, thiserror::Error)]
pub enum SecsError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// 轮询或报告变量缺少 numericID
    #[error("no numericID is defined for variable {0}")]
    MissingNumericId(String),

    /// 写入的变量不存在或不可写
    #[error("variable {0} does not exist or is not writable")]
    NotWritable(String),

    /// 写入的变量不是设备常量
    #[error("variable {0} is not an equipment constant")]
    NotEquipmentConstant(String),

    /// 写入值与变量格式不匹配
    #[error("value for variable {0} does not fit format {1}")]
    InvalidWriteValue(String, String),

    /// 连续重连失败，需要进程级重启
    #[error("reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    /// 宿主协作者错误
    #[error("host error: {0}")]
    Host(#[from] hpl_host::HostError),

    /// 驱动未启动
    #[error("driver not running")]
    NotRunning,

    /// 通道关闭
    #[error("channel closed")]
    ChannelClosed,
}
