//! 异步消息：不依赖通信状态，优先于状态处理
//!
//! 处理顺序：S1F1 在线检查 → S9F9 事务计时器超时 → S5F1 告警报告 → S6F11 事件报告。

use crate::alarm::AlarmReport;
use crate::alerts;
use crate::message::{Inbound, body};
use crate::session::Session;
use crate::timers::TimerKind;
use hpl_host::Alert;
use tracing::{debug, info, warn};

impl Session {
    /// 返回是否已处理
    pub(crate) fn dispatch_async(&mut self, inbound: &Inbound<'_>) -> bool {
        let header = &inbound.header;
        if header.is(1, 1) {
            let reply = self
                .encoder
                .reply(1, 2, header.system_bytes(), &body::online_data());
            self.send(reply);
            return true;
        }
        if header.is(9, 9) {
            self.on_transaction_timer_timeout();
            return true;
        }
        if header.is(5, 1) {
            self.on_alarm_report(inbound);
            return true;
        }
        if header.is(6, 11) {
            return self.on_event_report(inbound);
        }
        false
    }

    /// 对端报告事务计时器超时：只取消本端的通信超时
    fn on_transaction_timer_timeout(&mut self) {
        warn!(machine = %self.machine, state = ?self.state, "equipment reported transaction timer timeout");
        self.timers.cancel(TimerKind::CommTimeout);
    }

    fn on_alarm_report(&mut self, inbound: &Inbound<'_>) {
        let Some(report) = AlarmReport::parse(inbound) else {
            warn!(machine = %self.machine, "malformed alarm report");
            self.raise(Alert::new(alerts::BAD_ALARM_REPORT));
            return;
        };

        let ack = self
            .encoder
            .reply(5, 2, inbound.header.system_bytes(), &body::accepted());
        self.send(ack);
        self.clear_alert(alerts::BAD_ALARM_REPORT);

        info!(
            machine = %self.machine,
            code = report.code,
            set = report.set,
            text = %report.text,
            "alarm report"
        );
        if self.alarms.apply(&report) {
            self.publish_alarms();
        }
    }

    /// S6F11 `L3{DATAID, CEID, L{L2{RPTID, L{V…}}…}}`
    ///
    /// 结构错误时不回复，由对端重发。
    fn on_event_report(&mut self, inbound: &Inbound<'_>) -> bool {
        let mut reader = inbound.reader();
        if reader.read_list_header() != Some(3) {
            warn!(machine = %self.machine, "event report is not a three element list");
            return false;
        }
        let Some(_data_id) = reader.read_id() else {
            return false;
        };
        let Some(ceid) = reader.read_id() else {
            warn!(machine = %self.machine, "event report without CEID");
            return false;
        };
        let Some(group) = self.map.group(ceid).cloned() else {
            debug!(machine = %self.machine, ceid, "event report for unregistered CEID");
            self.ack_event(inbound);
            return true;
        };
        let Some(report_count) = reader.read_list_header() else {
            return false;
        };

        for _ in 0..report_count {
            if reader.read_list_header() != Some(2) {
                return false;
            }
            let Some(report_id) = reader.read_id() else {
                return false;
            };
            let Some(value_count) = reader.read_list_header() else {
                return false;
            };

            if report_id != ceid {
                for _ in 0..value_count {
                    // 非本驱动定义的报告，整体跳过
                    if reader.read_item().is_none() {
                        return false;
                    }
                }
                continue;
            }

            if value_count != group.variables.len() {
                warn!(
                    machine = %self.machine,
                    ceid,
                    expected = group.variables.len(),
                    received = value_count,
                    "event report value count mismatch"
                );
                return false;
            }

            let mut failed = false;
            for variable in &group.variables {
                let published = match reader.read_item() {
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
            self.ack_event(inbound);
            return true;
        }

        debug!(machine = %self.machine, ceid, "event report without a matching report");
        self.ack_event(inbound);
        true
    }

    fn ack_event(&mut self, inbound: &Inbound<'_>) {
        let ack = self
            .encoder
            .reply(6, 12, inbound.header.system_bytes(), &body::accepted());
        self.send(ack);
    }
}
