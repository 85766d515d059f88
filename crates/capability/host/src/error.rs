//! 协作者错误类型

/// 宿主协作者调用失败
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// 数据写入失败
    #[error("data write failed: {0}")]
    Write(String),

    /// 配置存储失败
    #[error("config store error: {0}")]
    Config(String),

    /// 锁中毒
    #[error("lock failed")]
    Lock,
}
