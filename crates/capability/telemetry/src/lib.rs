//! 追踪初始化、驱动计数器与会话 ID 生成。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 驱动计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub frames_unprocessed: u64,
    pub bytes_discarded: u64,
    pub request_timeouts: u64,
    pub reconnect_attempts: u64,
    pub decode_failures: u64,
    pub values_published: u64,
    pub publish_failures: u64,
}

/// 驱动计数器。
pub struct TelemetryMetrics {
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    frames_unprocessed: AtomicU64,
    bytes_discarded: AtomicU64,
    request_timeouts: AtomicU64,
    reconnect_attempts: AtomicU64,
    decode_failures: AtomicU64,
    values_published: AtomicU64,
    publish_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_unprocessed: AtomicU64::new(0),
            bytes_discarded: AtomicU64::new(0),
            request_timeouts: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            values_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_unprocessed: self.frames_unprocessed.load(Ordering::Relaxed),
            bytes_discarded: self.bytes_discarded.load(Ordering::Relaxed),
            request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            values_published: self.values_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的连接会话 ID（每次建立 TCP 连接一个）。
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录收到的完整帧。
pub fn record_frame_received() {
    metrics().frames_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录发出的帧。
pub fn record_frame_sent() {
    metrics().frames_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录无人处理的帧。
pub fn record_frame_unprocessed() {
    metrics().frames_unprocessed.fetch_add(1, Ordering::Relaxed);
}

/// 记录被丢弃的接收字节（超出缓冲或残帧）。
pub fn record_bytes_discarded(count: u64) {
    metrics().bytes_discarded.fetch_add(count, Ordering::Relaxed);
}

pub fn record_request_timeout() {
    metrics().request_timeouts.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reconnect_attempt() {
    metrics().reconnect_attempts.fetch_add(1, Ordering::Relaxed);
}

/// 记录单个变量解码失败。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_value_published() {
    metrics().values_published.fetch_add(1, Ordering::Relaxed);
}

pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}
