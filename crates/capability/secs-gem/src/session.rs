//! 协议会话（sans-IO）
//!
//! `Session` 持有一条设备连接的全部协议状态：通信状态、定时器、事务计数、
//! 接收缓冲与活动告警。它不做任何 IO，只消费事件（数据到达、定时器到期、
//! 连接结果、写入命令）并把要执行的动作放入发件箱，由反应器任务取出执行。
//!
//! 同一时刻最多一个进行中的请求/响应周期；异步消息（告警、事件、在线检查）
//! 不受通信状态限制。

use crate::alarm::ActiveAlarms;
use crate::alerts;
use crate::connection::ConnectionManager;
use crate::convert::{convert, ecid_item, encode_write_value};
use crate::error::SecsError;
use crate::frame::FrameBuffer;
use crate::item::SecsItem;
use crate::mapper::VariableMap;
use crate::message::{Encoder, Inbound, body, stype};
use crate::state::{CommState, Request};
use crate::timers::{TimerKind, Timers};
use bytes::Bytes;
use domain::{MachineModel, Variable, VariableKind, VariableValue};
use hpl_host::Alert;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 请求响应超时
pub const COMM_TIMEOUT: Duration = Duration::from_millis(2000);
/// Select.rsp / S1F13 之后等待对端发起 S1F13 的时间
pub const ESTABLISH_COMM_FALLBACK: Duration = Duration::from_millis(500);
/// 残帧保留时间
pub const DATA_COMPLETE_TIMEOUT: Duration = Duration::from_millis(500);
/// 常量写入确认超时
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(2000);
/// 事务 ID 不符后到 Separate.req、Separate.req 到重新握手的间隔
pub const REESTABLISH_DELAY: Duration = Duration::from_millis(2000);
/// 停止时等待进行中请求的上限
pub const STOP_GRACE: Duration = Duration::from_millis(2000);
/// 同一请求最多重发次数
pub const MAX_REQUEST_RETRIES: u32 = 3;
/// 轮询间隔下限
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 会话产生的动作，由反应器按顺序执行
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// 建立新的 TCP 连接（替换旧连接）
    Connect,
    /// 发送一帧
    Send(Bytes),
    /// 关闭连接；`graceful` 时先发送 FIN
    Close { graceful: bool },
    /// 推送变量值；`report_errors` 为 false 时写入失败只记日志
    Publish {
        variable: Variable,
        value: VariableValue,
        report_errors: bool,
    },
    RaiseAlert(Alert),
    ClearAlert(String),
    /// 发布连接状态到配置存储
    ConnectionStatus(bool),
    /// 停止完成
    Stopped,
    /// 连续重连失败，反应器以 `ReconnectExhausted` 结束
    Terminate { failures: u32 },
}

/// 会话的时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub link_test_interval: Option<Duration>,
    pub disconnect_report_delay: Duration,
}

impl SessionSettings {
    pub fn from_model(model: &MachineModel) -> Self {
        Self {
            poll_interval: Duration::from_secs(model.request_frequency).max(MIN_POLL_INTERVAL),
            link_test_interval: model
                .enable_periodic_link_test_messages
                .then(|| Duration::from_secs(model.link_test_frequency.max(1))),
            disconnect_report_delay: Duration::from_secs(
                model.disconnect_report_time.unwrap_or(0),
            ),
        }
    }
}

/// 排队中的常量写入
#[derive(Debug, Clone, PartialEq)]
struct PendingWrite {
    name: String,
    ecid: u32,
    value: SecsItem,
}

pub struct Session {
    pub(crate) machine: String,
    pub(crate) settings: SessionSettings,
    pub(crate) map: VariableMap,
    pub(crate) encoder: Encoder,
    pub(crate) frames: FrameBuffer,
    pub(crate) state: CommState,
    pub(crate) timers: Timers,
    pub(crate) conn: ConnectionManager,
    pub(crate) alarms: ActiveAlarms,
    next_transaction_id: u16,
    verification_transaction_id: u16,
    request_retry_count: u32,
    handshake_complete: bool,
    pending_writes: VecDeque<PendingWrite>,
    pub(crate) stopping: bool,
    outbox: Vec<Action>,
}

impl Session {
    pub fn new(machine: impl Into<String>, model: &MachineModel, map: VariableMap) -> Self {
        let sizing = map.sizing();
        Self {
            machine: machine.into(),
            settings: SessionSettings::from_model(model),
            encoder: Encoder {
                equip_device_id: model.equip_device_id,
                spark_device_id: model.spark_device_id,
                capacity: sizing.transmit,
            },
            frames: FrameBuffer::with_capacity(sizing.receive),
            map,
            state: CommState::Idle,
            timers: Timers::default(),
            conn: ConnectionManager::default(),
            alarms: ActiveAlarms::default(),
            next_transaction_id: 0,
            verification_transaction_id: 0,
            request_retry_count: 0,
            handshake_complete: false,
            pending_writes: VecDeque::new(),
            stopping: false,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> CommState {
        self.state
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    pub fn request_retry_count(&self) -> u32 {
        self.request_retry_count
    }

    pub fn alarms(&self) -> &ActiveAlarms {
        &self.alarms
    }

    pub fn map(&self) -> &VariableMap {
        &self.map
    }

    /// 最近的定时器截止时间
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    /// 取出待执行的动作
    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.outbox)
    }

    // ========================================================================
    // 事件入口
    // ========================================================================

    /// 收到 socket 数据
    pub fn on_data(&mut self, data: &[u8], now: Instant) {
        if !self.frames.push(data) {
            warn!(
                machine = %self.machine,
                received = data.len(),
                capacity = self.frames.capacity(),
                "receive buffer overflow, chunk dropped"
            );
            hpl_telemetry::record_bytes_discarded(data.len() as u64);
        }

        while let Some(frame) = self.frames.next_frame() {
            hpl_telemetry::record_frame_received();
            self.handle_frame(&frame, now);
        }

        self.timers.cancel(TimerKind::DataComplete);
        if !self.frames.is_empty() {
            self.timers
                .arm(TimerKind::DataComplete, now + DATA_COMPLETE_TIMEOUT);
        }
    }

    /// 处理全部已到期定时器
    pub fn on_timer(&mut self, now: Instant) {
        for kind in self.timers.expired(now) {
            // 前面的处理可能已取消或重设该定时器
            if self.timers.deadline(kind).is_some_and(|at| at <= now) {
                self.timers.cancel(kind);
                self.fire(kind, now);
            }
        }
    }

    fn fire(&mut self, kind: TimerKind, now: Instant) {
        match kind {
            TimerKind::CommTimeout => self.on_comm_timeout(now),
            TimerKind::EstablishCommFallback => {
                debug!(machine = %self.machine, "no S1F13 from equipment, sending our own");
                self.send_request(Request::EstablishComm, now);
            }
            TimerKind::Poll => self.on_poll(now),
            TimerKind::DataComplete => self.on_data_complete(),
            TimerKind::WriteTimeout => self.on_write_timeout(now),
            TimerKind::Reconnect => self.on_reconnect_timer(),
            TimerKind::SeparateRequest => self.on_separate_timer(now),
            TimerKind::RestartHandshake => {
                info!(machine = %self.machine, "restarting handshake");
                self.start_handshake(Request::Select, now);
            }
            TimerKind::LinkTest => self.on_link_test(now),
            TimerKind::DisconnectReport => self.on_disconnect_report(),
            TimerKind::StopGrace => {
                warn!(machine = %self.machine, state = ?self.state, "request still outstanding at stop");
                self.finish_stop();
            }
        }
    }

    /// 写入设备常量（S2F15）
    ///
    /// 校验失败触发对应告警并返回错误；请求进行中时排队到空闲后发送。
    pub fn write_data(
        &mut self,
        name: &str,
        value: &VariableValue,
        now: Instant,
    ) -> Result<(), SecsError> {
        let Some(variable) = self.map.writable.get(name).cloned() else {
            self.raise(alerts::not_writable(&self.machine, name));
            return Err(SecsError::NotWritable(name.to_string()));
        };
        self.clear_alert(alerts::not_writable_key(name));

        if variable.kind != VariableKind::EquipmentConstant {
            self.raise(alerts::not_equipment_constant(&self.machine, name));
            return Err(SecsError::NotEquipmentConstant(name.to_string()));
        }
        self.clear_alert(alerts::not_equipment_constant_key(name));

        let Some(ecid) = variable.numeric_id else {
            self.raise(alerts::no_numeric_id(&self.machine, name));
            return Err(SecsError::MissingNumericId(name.to_string()));
        };
        self.clear_alert(alerts::no_numeric_id_key(name));

        let value = encode_write_value(&variable, value)?;
        if !self.conn.is_connected() {
            return Err(SecsError::Connection("not connected".to_string()));
        }

        let write = PendingWrite {
            name: name.to_string(),
            ecid,
            value,
        };
        if self.state.is_idle() {
            self.send_write(write, now);
        } else {
            debug!(machine = %self.machine, variable = %name, state = ?self.state, "write queued");
            self.pending_writes.push_back(write);
        }
        Ok(())
    }

    /// 开始停止：清除全部定时器，进行中的请求最多再等待 `STOP_GRACE`
    pub fn begin_stop(&mut self, now: Instant) {
        if self.stopping {
            return;
        }
        self.stopping = true;
        self.timers.clear();
        self.pending_writes.clear();
        if self.conn.is_connected() && !self.state.is_idle() {
            info!(machine = %self.machine, state = ?self.state, "waiting for outstanding request before stop");
            self.timers.arm(TimerKind::StopGrace, now + STOP_GRACE);
        } else {
            self.finish_stop();
        }
    }

    pub(crate) fn finish_stop(&mut self) {
        if !self.conn.opened {
            return;
        }
        self.timers.clear();
        self.state = CommState::Idle;
        self.handshake_complete = false;
        self.conn.close();
        self.push(Action::Close { graceful: true });
        self.push(Action::Stopped);
        info!(machine = %self.machine, "session stopped");
    }

    // ========================================================================
    // 帧处理
    // ========================================================================

    fn handle_frame(&mut self, frame: &[u8], now: Instant) {
        let Some(inbound) = Inbound::parse(frame) else {
            debug!(machine = %self.machine, len = frame.len(), "frame shorter than header");
            hpl_telemetry::record_frame_unprocessed();
            return;
        };
        debug!(
            machine = %self.machine,
            stream = inbound.header.stream,
            function = inbound.header.function,
            stype = inbound.header.stype,
            transaction_id = inbound.header.transaction_id,
            "frame received"
        );

        if self.dispatch_async(&inbound) || self.handle_state_frame(&inbound, now) {
            return;
        }
        if inbound.is_linktest_response() {
            debug!(machine = %self.machine, "linktest response");
            return;
        }
        debug!(
            machine = %self.machine,
            state = ?self.state,
            stream = inbound.header.stream,
            function = inbound.header.function,
            "unprocessed frame"
        );
        hpl_telemetry::record_frame_unprocessed();
    }

    /// 当前通信状态对应的响应处理，返回是否已处理
    fn handle_state_frame(&mut self, inbound: &Inbound<'_>, now: Instant) -> bool {
        let header = &inbound.header;
        match self.state {
            CommState::Idle => false,
            CommState::WaitSelectResponse => {
                if !inbound.is_select_response() {
                    return false;
                }
                self.response_received();
                self.state = CommState::WaitEstablishCommRequest;
                self.timers
                    .arm(TimerKind::EstablishCommFallback, now + ESTABLISH_COMM_FALLBACK);
                true
            }
            CommState::WaitEstablishCommRequest => {
                if !header.is(1, 13) {
                    return false;
                }
                self.response_received();
                let reply =
                    self.encoder
                        .reply(1, 14, header.system_bytes(), &body::establish_comm_ack());
                self.send(reply);
                self.timers
                    .arm(TimerKind::EstablishCommFallback, now + ESTABLISH_COMM_FALLBACK);
                true
            }
            CommState::WaitEstablishCommResponse => {
                if !header.is(1, 14) || inbound.establish_comm_ack() != Some(0) {
                    return false;
                }
                self.response_received();
                self.send_request(Request::EnableAlarms, now);
                true
            }
            CommState::WaitEnableAlarmsAck => {
                if !(header.is(5, 4) || header.is(5, 0)) || inbound.ack_code() != Some(0) {
                    return false;
                }
                self.response_received();
                if self.map.has_event_reports() {
                    self.send_request(Request::DeleteReport, now);
                } else {
                    self.complete_handshake(now);
                }
                true
            }
            CommState::WaitDeleteReportAck => {
                self.on_report_ack(inbound, (2, 34), Some(Request::DefineReport), now)
            }
            CommState::WaitDefineReportAck => {
                self.on_report_ack(inbound, (2, 34), Some(Request::LinkReport), now)
            }
            CommState::WaitLinkReportAck => {
                self.on_report_ack(inbound, (2, 36), Some(Request::EventEnable), now)
            }
            CommState::WaitEventEnableAck => self.on_report_ack(inbound, (2, 38), None, now),
            CommState::WaitStatusVariablesResponse => {
                if inbound.is_failed_transaction() {
                    self.response_received();
                    warn!(machine = %self.machine, "failed transaction for status variable request");
                    self.raise(Alert::new(alerts::BAD_STATUS_RESPONSE));
                    self.after_status_variables(now);
                    return true;
                }
                if !header.is(1, 4) {
                    return false;
                }
                if self.verify_transaction(inbound, now) {
                    let variables = self.map.status_variables.clone();
                    if self.publish_poll_response(inbound, &variables) {
                        self.clear_alert(alerts::BAD_STATUS_RESPONSE);
                    } else {
                        self.raise(Alert::new(alerts::BAD_STATUS_RESPONSE));
                    }
                    self.after_status_variables(now);
                }
                true
            }
            CommState::WaitEquipmentConstantsResponse => {
                if inbound.is_failed_transaction() {
                    self.response_received();
                    warn!(machine = %self.machine, "failed transaction for equipment constant request");
                    self.raise(Alert::new(alerts::BAD_CONSTANT_RESPONSE));
                    self.enter_idle(now);
                    return true;
                }
                if !header.is(2, 14) {
                    return false;
                }
                if self.verify_transaction(inbound, now) {
                    let variables = self.map.equipment_constants.clone();
                    if self.publish_poll_response(inbound, &variables) {
                        self.clear_alert(alerts::BAD_CONSTANT_RESPONSE);
                    } else {
                        self.raise(Alert::new(alerts::BAD_CONSTANT_RESPONSE));
                    }
                    self.enter_idle(now);
                }
                true
            }
            CommState::WaitConstantWriteAck => {
                if !header.is(2, 16) || inbound.ack_code() != Some(0) {
                    return false;
                }
                self.timers.cancel(TimerKind::WriteTimeout);
                info!(machine = %self.machine, "equipment constant written");
                self.clear_alert(alerts::WRITE_FAILED);
                self.enter_idle(now);
                true
            }
        }
    }

    fn on_report_ack(
        &mut self,
        inbound: &Inbound<'_>,
        (stream, function): (u8, u8),
        next: Option<Request>,
        now: Instant,
    ) -> bool {
        if !inbound.header.is(stream, function) || inbound.ack_code() != Some(0) {
            return false;
        }
        self.response_received();
        match next {
            Some(request) => self.send_request(request, now),
            None => self.complete_handshake(now),
        }
        true
    }

    /// 轮询响应必须回显请求的事务 ID；不符时安排 Separate.req 后重新握手
    fn verify_transaction(&mut self, inbound: &Inbound<'_>, now: Instant) -> bool {
        self.response_received();
        let received = inbound.header.transaction_id;
        if received == self.verification_transaction_id {
            return true;
        }
        warn!(
            machine = %self.machine,
            expected = self.verification_transaction_id,
            received,
            "transaction id mismatch, re-establishing communication"
        );
        self.timers
            .arm(TimerKind::SeparateRequest, now + REESTABLISH_DELAY);
        false
    }

    /// 按位置解码轮询响应 `L n{item…}` 并推送
    ///
    /// 每个配置的变量都要有对应元素；缺失或无法解码的变量触发告警。
    /// 响应体不是列表时返回 `false`。
    fn publish_poll_response(&mut self, inbound: &Inbound<'_>, variables: &[Variable]) -> bool {
        let mut reader = inbound.reader();
        let Some(count) = reader.read_list_header() else {
            warn!(machine = %self.machine, "poll response is not a list");
            for variable in variables {
                self.data_failure(variable);
            }
            return false;
        };
        if count != variables.len() {
            warn!(
                machine = %self.machine,
                expected = variables.len(),
                received = count,
                "poll response item count mismatch"
            );
        }

        let mut failed = false;
        for (index, variable) in variables.iter().enumerate() {
            let item = if index < count { reader.read_item() } else { None };
            let published = match item {
                Some(item) => self.publish_converted(variable, &item),
                None => {
                    self.data_failure(variable);
                    false
                }
            };
            failed |= !published;
        }
        if !failed {
            self.clear_alert(alerts::FAILED_TO_GET_DATA);
        }
        true
    }

    /// 转换并推送单个值；转换失败时触发告警并返回 `false`
    pub(crate) fn publish_converted(&mut self, variable: &Variable, item: &SecsItem) -> bool {
        match convert(&item.value(), variable) {
            Some(value) => {
                self.push(Action::Publish {
                    variable: variable.clone(),
                    value,
                    report_errors: true,
                });
                true
            }
            None => {
                self.data_failure(variable);
                false
            }
        }
    }

    pub(crate) fn data_failure(&mut self, variable: &Variable) {
        warn!(machine = %self.machine, variable = %variable.name, "failed to get variable data");
        hpl_telemetry::record_decode_failure();
        self.raise(Alert::new(alerts::FAILED_TO_GET_DATA).with_error(variable.name.clone()));
    }

    // ========================================================================
    // 请求与状态推进
    // ========================================================================

    /// 握手起点（Select 或 S1F13）；握手完成前暂停轮询
    pub(crate) fn start_handshake(&mut self, request: Request, now: Instant) {
        self.handshake_complete = false;
        self.timers.cancel(TimerKind::Poll);
        self.timers.cancel(TimerKind::LinkTest);
        self.send_request(request, now);
    }

    pub(crate) fn send_request(&mut self, request: Request, now: Instant) {
        if self.stopping {
            self.enter_idle(now);
            return;
        }
        let transaction_id = self.next_transaction_id();
        let frame = self.request_frame(request, transaction_id);
        if matches!(
            request,
            Request::StatusVariables | Request::EquipmentConstants
        ) {
            self.verification_transaction_id = transaction_id;
        }
        self.state = request.wait_state();
        self.timers.cancel(TimerKind::EstablishCommFallback);
        self.timers.arm(TimerKind::CommTimeout, now + COMM_TIMEOUT);
        debug!(machine = %self.machine, ?request, transaction_id, "request sent");
        self.send(frame);
    }

    fn request_frame(&self, request: Request, transaction_id: u16) -> Bytes {
        let (stream, function, body) = match request {
            Request::Select => return self.encoder.control(stype::SELECT_REQ, transaction_id),
            Request::EstablishComm => (1, 13, body::establish_comm_request()),
            Request::EnableAlarms => (5, 3, body::enable_alarms()),
            Request::DeleteReport => (2, 33, self.map.delete_reports_body()),
            Request::DefineReport => (2, 33, self.map.define_reports_body()),
            Request::LinkReport => (2, 35, self.map.link_reports_body()),
            Request::EventEnable => (2, 37, self.map.enable_events_body()),
            Request::StatusVariables => (1, 3, self.map.status_variables_body()),
            Request::EquipmentConstants => (2, 13, self.map.equipment_constants_body()),
        };
        self.encoder
            .request(stream, function, transaction_id, &body)
    }

    fn send_write(&mut self, write: PendingWrite, now: Instant) {
        let transaction_id = self.next_transaction_id();
        let body = body::constant_write(ecid_item(write.ecid), write.value);
        let frame = self.encoder.request(2, 15, transaction_id, &body);
        self.state = CommState::WaitConstantWriteAck;
        self.timers.arm(TimerKind::WriteTimeout, now + WRITE_TIMEOUT);
        info!(machine = %self.machine, variable = %write.name, ecid = write.ecid, transaction_id, "writing equipment constant");
        self.send(frame);
    }

    /// 匹配到响应：取消超时，重置重试计数
    fn response_received(&mut self) {
        self.timers.cancel(TimerKind::CommTimeout);
        self.timers.cancel(TimerKind::EstablishCommFallback);
        self.request_retry_count = 0;
        self.clear_alert(alerts::NO_RESPONSE);
    }

    fn complete_handshake(&mut self, now: Instant) {
        info!(machine = %self.machine, "communication established");
        self.conn.reconnect_count = 1;
        self.handshake_complete = true;
        if let Some(interval) = self.settings.link_test_interval {
            self.timers.arm(TimerKind::LinkTest, now + interval);
        }
        self.enter_idle(now);
    }

    fn after_status_variables(&mut self, now: Instant) {
        if self.map.equipment_constants.is_empty() {
            self.enter_idle(now);
        } else {
            self.send_request(Request::EquipmentConstants, now);
        }
    }

    /// 回到空闲：优先发送排队的写入，否则确保轮询定时器已设置
    pub(crate) fn enter_idle(&mut self, now: Instant) {
        self.state = CommState::Idle;
        if self.stopping {
            self.finish_stop();
            return;
        }
        if let Some(write) = self.pending_writes.pop_front() {
            self.send_write(write, now);
            return;
        }
        if self.handshake_complete && !self.timers.is_armed(TimerKind::Poll) {
            self.timers
                .arm(TimerKind::Poll, now + self.settings.poll_interval);
        }
    }

    fn on_poll(&mut self, now: Instant) {
        if !self.handshake_complete || !self.state.is_idle() {
            // 忙时跳过，回到空闲时重新设置
            return;
        }
        if !self.map.status_variables.is_empty() {
            self.send_request(Request::StatusVariables, now);
        } else if !self.map.equipment_constants.is_empty() {
            self.send_request(Request::EquipmentConstants, now);
        } else {
            self.enter_idle(now);
        }
    }

    pub(crate) fn on_comm_timeout(&mut self, now: Instant) {
        hpl_telemetry::record_request_timeout();
        self.raise(Alert::new(alerts::NO_RESPONSE));
        self.request_retry_count += 1;

        if self.request_retry_count > MAX_REQUEST_RETRIES {
            warn!(machine = %self.machine, state = ?self.state, "no response after retries, reconnecting");
            self.request_retry_count = 0;
            self.disconnect_reconnect(true, now);
            return;
        }
        match self.state.retry_request() {
            Some(request) => {
                info!(
                    machine = %self.machine,
                    ?request,
                    attempt = self.request_retry_count,
                    "request timed out, retrying"
                );
                self.send_request(request, now);
            }
            None => self.enter_idle(now),
        }
    }

    fn on_write_timeout(&mut self, now: Instant) {
        warn!(machine = %self.machine, "equipment constant write not acknowledged");
        self.raise(Alert::new(alerts::WRITE_FAILED));
        if self.state == CommState::WaitConstantWriteAck {
            self.enter_idle(now);
        }
    }

    fn on_data_complete(&mut self) {
        let discarded = self.frames.clear();
        if discarded > 0 {
            warn!(machine = %self.machine, discarded, "incomplete frame discarded");
            hpl_telemetry::record_bytes_discarded(discarded as u64);
        }
    }

    fn on_separate_timer(&mut self, now: Instant) {
        let transaction_id = self.next_transaction_id();
        let frame = self.encoder.control(stype::SEPARATE_REQ, transaction_id);
        info!(machine = %self.machine, "sending separate request");
        self.send(frame);
        self.timers
            .arm(TimerKind::RestartHandshake, now + REESTABLISH_DELAY);
    }

    fn on_link_test(&mut self, now: Instant) {
        let Some(interval) = self.settings.link_test_interval else {
            return;
        };
        let transaction_id = self.next_transaction_id();
        let frame = self.encoder.control(stype::LINKTEST_REQ, transaction_id);
        self.send(frame);
        self.timers.arm(TimerKind::LinkTest, now + interval);
    }

    // ========================================================================
    // 发件箱
    // ========================================================================

    fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    pub(crate) fn reset_transactions(&mut self) {
        self.next_transaction_id = 0;
    }

    pub(crate) fn reset_exchange(&mut self) {
        self.state = CommState::Idle;
        self.handshake_complete = false;
        if !self.pending_writes.is_empty() {
            warn!(machine = %self.machine, dropped = self.pending_writes.len(), "pending writes dropped");
            self.pending_writes.clear();
        }
        let discarded = self.frames.clear();
        if discarded > 0 {
            hpl_telemetry::record_bytes_discarded(discarded as u64);
        }
    }

    pub(crate) fn send(&mut self, frame: Bytes) {
        self.push(Action::Send(frame));
    }

    pub(crate) fn push(&mut self, action: Action) {
        self.outbox.push(action);
    }

    pub(crate) fn raise(&mut self, alert: Alert) {
        self.push(Action::RaiseAlert(alert));
    }

    pub(crate) fn clear_alert(&mut self, key: impl Into<String>) {
        self.push(Action::ClearAlert(key.into()));
    }

    /// 按 `machineConnected` 变量推送连接状态
    pub(crate) fn publish_connected(&mut self, connected: bool) {
        let variables = self.map.connected_variables.clone();
        for variable in variables {
            self.push(Action::Publish {
                variable,
                value: VariableValue::Bool(connected),
                report_errors: false,
            });
        }
    }

    /// 把当前活动告警推送到告警镜像变量
    pub(crate) fn publish_alarms(&mut self) {
        let codes = self.alarms.code_values();
        let texts = self.alarms.text_values();
        for variable in self.map.alarm_code_variables.clone() {
            self.push(Action::Publish {
                variable,
                value: codes.clone(),
                report_errors: true,
            });
        }
        for variable in self.map.alarm_text_variables.clone() {
            self.push(Action::Publish {
                variable,
                value: texts.clone(),
                report_errors: true,
            });
        }
    }
}
