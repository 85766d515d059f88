//! 连接管理：建连、断线上报、重连与握手起点切换

use crate::alerts;
use crate::session::{Action, Session};
use crate::state::StartupStep;
use crate::timers::TimerKind;
use hpl_host::Alert;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// 断线后的重连间隔
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);
/// 连续重连上限，超过后交由进程级重启
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug)]
pub(crate) struct ConnectionManager {
    pub link: LinkState,
    /// 会话已打开（`open` 之后、停止之前）
    pub opened: bool,
    pub reconnect_count: u32,
    pub startup: StartupStep,
    /// 本次连接期内已推送过 `machineConnected = true`
    pub reported: bool,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self {
            link: LinkState::Disconnected,
            opened: false,
            reconnect_count: 1,
            startup: StartupStep::Select,
            reported: false,
        }
    }
}

impl ConnectionManager {
    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    pub fn close(&mut self) {
        self.link = LinkState::Disconnected;
        self.opened = false;
    }
}

impl Session {
    pub fn link_state(&self) -> LinkState {
        self.conn.link
    }

    pub fn reconnect_count(&self) -> u32 {
        self.conn.reconnect_count
    }

    /// 打开会话并发起第一次连接
    pub fn open(&mut self) {
        self.conn = ConnectionManager {
            opened: true,
            ..ConnectionManager::default()
        };
        self.stopping = false;
        self.alarms.clear();
        self.publish_alarms();
        self.connect();
    }

    fn connect(&mut self) {
        self.reset_transactions();
        self.conn.link = LinkState::Connecting;
        info!(machine = %self.machine, attempt = self.conn.reconnect_count, "connecting");
        self.push(Action::Connect);
    }

    /// TCP 连接建立
    pub fn on_connected(&mut self, now: Instant) {
        if !self.conn.opened || self.stopping {
            return;
        }
        info!(machine = %self.machine, "connected");
        self.conn.link = LinkState::Connected;
        self.clear_alert(alerts::CONNECTIVITY);
        self.connection_detected();
        self.push(Action::ConnectionStatus(true));

        let step = self.conn.startup;
        self.conn.startup = step.toggled();
        self.start_handshake(step.request(), now);
    }

    pub fn on_connect_failed(&mut self, error: &str, now: Instant) {
        warn!(machine = %self.machine, error = %error, "connect failed");
        self.disconnect_reconnect(false, now);
    }

    pub fn on_socket_error(&mut self, error: &str, now: Instant) {
        warn!(machine = %self.machine, error = %error, "socket error");
        self.disconnect_reconnect(false, now);
    }

    /// 对端关闭连接
    pub fn on_socket_end(&mut self, now: Instant) {
        if self.stopping {
            self.finish_stop();
            return;
        }
        info!(machine = %self.machine, "connection closed by equipment");
        self.conn.startup = StartupStep::Select;
        self.disconnect_reconnect(false, now);
    }

    /// 丢弃当前连接并安排重连
    pub(crate) fn disconnect_reconnect(&mut self, graceful: bool, now: Instant) {
        if !self.conn.opened {
            return;
        }
        if self.stopping {
            self.finish_stop();
            return;
        }

        self.reset_exchange();
        let pending_report = self.timers.deadline(TimerKind::DisconnectReport);
        self.timers.clear();
        if let Some(at) = pending_report {
            self.timers.arm(TimerKind::DisconnectReport, at);
        }

        self.conn.link = LinkState::Disconnected;
        self.push(Action::Close { graceful });
        self.raise(Alert::new(alerts::CONNECTIVITY));
        self.disconnection_detected(now);
        self.push(Action::ConnectionStatus(false));
        self.timers.arm(TimerKind::Reconnect, now + RECONNECT_DELAY);
    }

    pub(crate) fn on_reconnect_timer(&mut self) {
        self.conn.reconnect_count += 1;
        hpl_telemetry::record_reconnect_attempt();
        if self.conn.reconnect_count > MAX_RECONNECT_ATTEMPTS {
            let failures = self.conn.reconnect_count - 1;
            error!(machine = %self.machine, failures, "reconnect attempts exhausted");
            self.timers.clear();
            self.conn.close();
            self.push(Action::Terminate { failures });
            return;
        }
        self.connect();
    }

    fn connection_detected(&mut self) {
        self.timers.cancel(TimerKind::DisconnectReport);
        if !self.conn.reported {
            self.conn.reported = true;
            self.publish_connected(true);
        }
    }

    fn disconnection_detected(&mut self, now: Instant) {
        if self.timers.is_armed(TimerKind::DisconnectReport) {
            return;
        }
        self.timers.arm(
            TimerKind::DisconnectReport,
            now + self.settings.disconnect_report_delay,
        );
    }

    pub(crate) fn on_disconnect_report(&mut self) {
        info!(machine = %self.machine, "reporting machine disconnected");
        self.conn.reported = false;
        self.publish_connected(false);
    }
}
