//! 活动告警集合（由 S5F1 告警报告维护）

use crate::item::SecsItem;
use crate::message::{ALARM_SET, Inbound};
use domain::VariableValue;

/// 解析后的 S5F1：`L3{B ALCD, U4 ALID, A ALTX}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmReport {
    pub set: bool,
    pub code: u32,
    pub text: String,
}

impl AlarmReport {
    pub fn parse(inbound: &Inbound<'_>) -> Option<Self> {
        let SecsItem::List(items) = inbound.first_item()? else {
            return None;
        };
        match items.as_slice() {
            [SecsItem::Binary(flag), SecsItem::U4(code), SecsItem::Ascii(text)]
                if flag.len() == 1 && code.len() == 1 && !text.is_empty() =>
            {
                Some(Self {
                    set: flag[0] & ALARM_SET != 0,
                    code: code[0],
                    text: text.clone(),
                })
            }
            _ => None,
        }
    }
}

/// 当前活动告警（代码与文本平行存放）
#[derive(Debug, Clone, Default)]
pub struct ActiveAlarms {
    codes: Vec<u32>,
    texts: Vec<String>,
}

impl ActiveAlarms {
    /// 应用一条告警报告，集合有变化时返回 `true`
    pub fn apply(&mut self, report: &AlarmReport) -> bool {
        let position = self.codes.iter().position(|code| *code == report.code);
        match (report.set, position) {
            (true, None) => {
                self.codes.push(report.code);
                self.texts.push(report.text.clone());
                true
            }
            (false, Some(index)) => {
                self.codes.remove(index);
                self.texts.remove(index);
                true
            }
            _ => false,
        }
    }

    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn clear(&mut self) {
        self.codes.clear();
        self.texts.clear();
    }

    pub fn code_values(&self) -> VariableValue {
        VariableValue::Array(
            self.codes
                .iter()
                .map(|code| VariableValue::U64(u64::from(*code)))
                .collect(),
        )
    }

    pub fn text_values(&self) -> VariableValue {
        VariableValue::Array(
            self.texts
                .iter()
                .map(|text| VariableValue::String(text.clone()))
                .collect(),
        )
    }
}
