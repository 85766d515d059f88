//! 会话定时器表：每类定时器至多一个截止时间，由反应器循环统一等待

use std::collections::HashMap;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// 请求响应超时
    CommTimeout,
    /// Select.rsp / S1F13 之后等待对端发起，超时由本端发送 S1F13
    EstablishCommFallback,
    /// 轮询
    Poll,
    /// 残帧清理
    DataComplete,
    /// 常量写入确认
    WriteTimeout,
    /// 重连
    Reconnect,
    /// 事务 ID 不符后发送 Separate.req
    SeparateRequest,
    /// Separate.req 之后重新握手
    RestartHandshake,
    /// 周期 Linktest
    LinkTest,
    /// 断线上报延迟
    DisconnectReport,
    /// 停止时等待进行中的请求
    StopGrace,
}

#[derive(Debug, Default)]
pub struct Timers {
    deadlines: HashMap<TimerKind, Instant>,
}

impl Timers {
    pub fn arm(&mut self, kind: TimerKind, at: Instant) {
        self.deadlines.insert(kind, at);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines.remove(&kind);
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.deadlines.get(&kind).copied()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// 已到期的定时器（按截止时间排序，不移除）
    ///
    /// 调用方逐个 `cancel` 后触发；前一个处理过程可能取消或重设后面的定时器，
    /// 触发前应再次确认 `deadline(kind) <= now`。
    pub fn expired(&self, now: Instant) -> Vec<TimerKind> {
        let mut expired: Vec<(Instant, TimerKind)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(kind, at)| (*at, *kind))
            .collect();
        expired.sort();
        expired.into_iter().map(|(_, kind)| kind).collect()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}
