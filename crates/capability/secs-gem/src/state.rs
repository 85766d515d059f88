//! 通信状态与请求类型

/// 当前等待的响应；`Idle` 表示没有进行中的请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommState {
    #[default]
    Idle,
    WaitSelectResponse,
    WaitEstablishCommRequest,
    WaitEstablishCommResponse,
    WaitEnableAlarmsAck,
    WaitDeleteReportAck,
    WaitDefineReportAck,
    WaitLinkReportAck,
    WaitEventEnableAck,
    WaitStatusVariablesResponse,
    WaitEquipmentConstantsResponse,
    WaitConstantWriteAck,
}

impl CommState {
    /// 超时后重发的请求
    pub fn retry_request(self) -> Option<Request> {
        let request = match self {
            Self::WaitSelectResponse => Request::Select,
            Self::WaitEstablishCommRequest | Self::WaitEstablishCommResponse => {
                Request::EstablishComm
            }
            Self::WaitEnableAlarmsAck => Request::EnableAlarms,
            Self::WaitDeleteReportAck => Request::DeleteReport,
            Self::WaitDefineReportAck => Request::DefineReport,
            Self::WaitLinkReportAck => Request::LinkReport,
            Self::WaitEventEnableAck => Request::EventEnable,
            Self::WaitStatusVariablesResponse => Request::StatusVariables,
            Self::WaitEquipmentConstantsResponse => Request::EquipmentConstants,
            Self::Idle | Self::WaitConstantWriteAck => return None,
        };
        Some(request)
    }

    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

/// 主动发出的请求（发送后进入对应等待状态）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// HSMS Select.req
    Select,
    /// S1F13
    EstablishComm,
    /// S5F3
    EnableAlarms,
    /// S2F33（删除）
    DeleteReport,
    /// S2F33（定义）
    DefineReport,
    /// S2F35
    LinkReport,
    /// S2F37
    EventEnable,
    /// S1F3
    StatusVariables,
    /// S2F13
    EquipmentConstants,
}

impl Request {
    pub fn wait_state(self) -> CommState {
        match self {
            Self::Select => CommState::WaitSelectResponse,
            Self::EstablishComm => CommState::WaitEstablishCommResponse,
            Self::EnableAlarms => CommState::WaitEnableAlarmsAck,
            Self::DeleteReport => CommState::WaitDeleteReportAck,
            Self::DefineReport => CommState::WaitDefineReportAck,
            Self::LinkReport => CommState::WaitLinkReportAck,
            Self::EventEnable => CommState::WaitEventEnableAck,
            Self::StatusVariables => CommState::WaitStatusVariablesResponse,
            Self::EquipmentConstants => CommState::WaitEquipmentConstantsResponse,
        }
    }

    /// 数据消息的 stream/function；Select 为控制消息
    pub fn stream_function(self) -> Option<(u8, u8)> {
        match self {
            Self::Select => None,
            Self::EstablishComm => Some((1, 13)),
            Self::EnableAlarms => Some((5, 3)),
            Self::DeleteReport | Self::DefineReport => Some((2, 33)),
            Self::LinkReport => Some((2, 35)),
            Self::EventEnable => Some((2, 37)),
            Self::StatusVariables => Some((1, 3)),
            Self::EquipmentConstants => Some((2, 13)),
        }
    }
}

/// 建连后的第一步，每次重连交替，兼容由任一端发起握手的设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupStep {
    #[default]
    Select,
    EstablishComm,
}

impl StartupStep {
    pub fn toggled(self) -> Self {
        match self {
            Self::Select => Self::EstablishComm,
            Self::EstablishComm => Self::Select,
        }
    }

    pub fn request(self) -> Request {
        match self {
            Self::Select => Request::Select,
            Self::EstablishComm => Request::EstablishComm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_maps_back_to_request() {
        for request in [
            Request::Select,
            Request::EnableAlarms,
            Request::DeleteReport,
            Request::DefineReport,
            Request::LinkReport,
            Request::EventEnable,
            Request::StatusVariables,
            Request::EquipmentConstants,
        ] {
            assert_eq!(request.wait_state().retry_request(), Some(request));
        }
        assert_eq!(
            CommState::WaitEstablishCommRequest.retry_request(),
            Some(Request::EstablishComm)
        );
        assert_eq!(CommState::WaitConstantWriteAck.retry_request(), None);
    }

    #[test]
    fn test_startup_toggles() {
        assert_eq!(StartupStep::Select.toggled(), StartupStep::EstablishComm);
        assert_eq!(StartupStep::EstablishComm.toggled().request(), Request::Select);
    }
}
