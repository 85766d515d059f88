//! 变量映射：把配置变量划分为轮询列表与 CEID 报告组，并生成报告相关请求体
//!
//! 约定：本驱动定义的每个报告 ID 都等于其 CEID。

use crate::error::SecsError;
use crate::item::SecsItem;
use crate::message::DATA_ID;
use domain::{Variable, VariableKind};
use std::collections::HashMap;

const TRANSMIT_BASE_SIZE: usize = 20;
const RECEIVE_BASE_SIZE: usize = 20;
const REQUEST_HEADER_SIZE: usize = 18;
const REPORT_BASE_SIZE: usize = 30;
const TRANSMIT_MIN_SIZE: usize = 100;
const RECEIVE_MIN_SIZE: usize = 100;
/// 每个接收数据项预留的字节数
const RECEIVE_PER_ITEM: usize = 100;
/// 每个请求 ID 占用的字节数
const TRANSMIT_PER_ITEM: usize = 6;
/// 异步 Linktest 与告警报文预留
const ASYNC_HEADROOM: usize = 14 + 100;

/// 同一 CEID 下的变量（顺序即报告内的位置）
#[derive(Debug, Clone, PartialEq)]
pub struct CeidGroup {
    pub ceid: u32,
    pub variables: Vec<Variable>,
}

/// 构建映射时发现的非致命配置问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapperIssue {
    /// DV 未配置 CEID，已跳过
    DataVariableWithoutCeid(String),
}

/// 收发缓冲大小
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizing {
    pub transmit: usize,
    pub receive: usize,
}

/// 启动时构建的变量映射
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    pub status_variables: Vec<Variable>,
    pub equipment_constants: Vec<Variable>,
    pub ceid_groups: Vec<CeidGroup>,
    pub writable: HashMap<String, Variable>,
    pub alarm_code_variables: Vec<Variable>,
    pub alarm_text_variables: Vec<Variable>,
    pub connected_variables: Vec<Variable>,
}

impl VariableMap {
    /// 划分变量
    ///
    /// 轮询或报告变量缺少 numericID 时返回错误（启动失败）；
    /// 缺少 CEID 的 DV 作为问题返回并跳过。
    pub fn build(variables: &[Variable]) -> Result<(Self, Vec<MapperIssue>), SecsError> {
        let mut map = Self::default();
        let mut issues = Vec::new();

        for variable in variables {
            match variable.kind {
                VariableKind::ActiveAlarmCodes => map.alarm_code_variables.push(variable.clone()),
                VariableKind::ActiveAlarmTexts => map.alarm_text_variables.push(variable.clone()),
                _ => {}
            }
            if variable.is_writable() {
                map.writable.insert(variable.name.clone(), variable.clone());
            }
            if variable.machine_connected {
                map.connected_variables.push(variable.clone());
                continue;
            }
            if variable.is_writable() {
                continue;
            }

            let polled = matches!(
                variable.kind,
                VariableKind::StatusVariable
                    | VariableKind::EquipmentConstant
                    | VariableKind::DataVariable
            );
            match (variable.ceid, variable.kind) {
                (Some(ceid), _) if polled => {
                    require_numeric_id(variable)?;
                    map.add_to_group(ceid, variable.clone());
                }
                (Some(_), _) => {}
                (None, VariableKind::StatusVariable) => {
                    require_numeric_id(variable)?;
                    map.status_variables.push(variable.clone());
                }
                (None, VariableKind::EquipmentConstant) => {
                    require_numeric_id(variable)?;
                    map.equipment_constants.push(variable.clone());
                }
                (None, VariableKind::DataVariable) => {
                    issues.push(MapperIssue::DataVariableWithoutCeid(variable.name.clone()));
                }
                (None, _) => {}
            }
        }

        Ok((map, issues))
    }

    fn add_to_group(&mut self, ceid: u32, variable: Variable) {
        match self.ceid_groups.iter_mut().find(|group| group.ceid == ceid) {
            Some(group) => group.variables.push(variable),
            None => self.ceid_groups.push(CeidGroup {
                ceid,
                variables: vec![variable],
            }),
        }
    }

    pub fn group(&self, ceid: u32) -> Option<&CeidGroup> {
        self.ceid_groups.iter().find(|group| group.ceid == ceid)
    }

    pub fn has_event_reports(&self) -> bool {
        !self.ceid_groups.is_empty()
    }

    /// S2F33：删除本驱动定义的全部报告
    pub fn delete_reports_body(&self) -> SecsItem {
        self.report_definitions(|_| SecsItem::list(vec![]))
    }

    /// S2F33：按 CEID 定义报告
    pub fn define_reports_body(&self) -> SecsItem {
        self.report_definitions(|group| {
            SecsItem::list(group.variables.iter().map(numeric_id_item).collect())
        })
    }

    fn report_definitions(&self, variables: impl Fn(&CeidGroup) -> SecsItem) -> SecsItem {
        let reports = self
            .ceid_groups
            .iter()
            .map(|group| SecsItem::list(vec![SecsItem::u4(group.ceid), variables(group)]))
            .collect();
        SecsItem::list(vec![SecsItem::u4(DATA_ID), SecsItem::list(reports)])
    }

    /// S2F35：每个 CEID 链接到同号报告
    pub fn link_reports_body(&self) -> SecsItem {
        let links = self
            .ceid_groups
            .iter()
            .map(|group| {
                SecsItem::list(vec![
                    SecsItem::u4(group.ceid),
                    SecsItem::list(vec![SecsItem::u4(group.ceid)]),
                ])
            })
            .collect();
        SecsItem::list(vec![SecsItem::u4(DATA_ID), SecsItem::list(links)])
    }

    /// S2F37：启用全部 CEID
    pub fn enable_events_body(&self) -> SecsItem {
        let ceids = self
            .ceid_groups
            .iter()
            .map(|group| SecsItem::u4(group.ceid))
            .collect();
        SecsItem::list(vec![SecsItem::boolean(true), SecsItem::list(ceids)])
    }

    /// S1F3
    pub fn status_variables_body(&self) -> SecsItem {
        SecsItem::list(self.status_variables.iter().map(numeric_id_item).collect())
    }

    /// S2F13
    pub fn equipment_constants_body(&self) -> SecsItem {
        SecsItem::list(self.equipment_constants.iter().map(numeric_id_item).collect())
    }

    /// 收发缓冲大小
    pub fn sizing(&self) -> BufferSizing {
        let polled = self.status_variables.len().max(self.equipment_constants.len());
        let mut transmit = TRANSMIT_BASE_SIZE + TRANSMIT_PER_ITEM * polled + REQUEST_HEADER_SIZE;
        let mut receive = RECEIVE_BASE_SIZE + RECEIVE_PER_ITEM * polled;

        let define_reports = REPORT_BASE_SIZE
            + self
                .ceid_groups
                .iter()
                .map(|group| 12 + TRANSMIT_PER_ITEM * group.variables.len())
                .sum::<usize>();
        let largest_group = self
            .ceid_groups
            .iter()
            .map(|group| group.variables.len())
            .max()
            .unwrap_or(0);
        let event_report = REPORT_BASE_SIZE + RECEIVE_PER_ITEM * largest_group;

        transmit = transmit.max(define_reports);
        receive = receive.max(event_report) + ASYNC_HEADROOM;

        BufferSizing {
            transmit: transmit.max(TRANSMIT_MIN_SIZE),
            receive: receive.max(RECEIVE_MIN_SIZE),
        }
    }
}

fn require_numeric_id(variable: &Variable) -> Result<u32, SecsError> {
    variable
        .numeric_id
        .ok_or_else(|| SecsError::MissingNumericId(variable.name.clone()))
}

/// 已在 build 中校验过 numericID
fn numeric_id_item(variable: &Variable) -> SecsItem {
    SecsItem::u4(variable.numeric_id.unwrap_or_default())
}
