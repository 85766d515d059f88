//! SECS 报文：4 字节长度 + 10 字节头 + SECS-II 报文体
//!
//! ```text
//! [0..4]   报文长度（不含自身，大端）
//! [4..6]   device id（HSMS 控制消息为 0xFFFF）
//! [6]      stream（最高位为 W 位）
//! [7]      function
//! [8]      PType
//! [9]      SType（0 = 数据消息）
//! [10..12] source id
//! [12..14] transaction id
//! ```

use crate::frame::LENGTH_PREFIX_LEN;
use crate::item::{ItemReader, SecsItem};
use bytes::{BufMut, Bytes, BytesMut};

pub const HEADER_LEN: usize = 10;
pub const FRAME_HEADER_LEN: usize = LENGTH_PREFIX_LEN + HEADER_LEN;
pub const WAIT_BIT: u8 = 0x80;
pub const CONTROL_DEVICE_ID: u16 = 0xFFFF;

/// 删除全部报告时使用的 DATAID
pub const DATA_ID: u32 = 3000;
/// S5F3 ALED：启用全部告警
pub const ENABLE_ALARMS: u8 = 0x80;
/// S5F1 ALCD 最高位：告警置位
pub const ALARM_SET: u8 = 0x80;
/// 各类 ACK 的成功码
pub const ACCEPTED: u8 = 0;

/// HSMS 控制消息类型
pub mod stype {
    pub const DATA: u8 = 0;
    pub const SELECT_REQ: u8 = 1;
    pub const SELECT_RSP: u8 = 2;
    pub const LINKTEST_REQ: u8 = 5;
    pub const LINKTEST_RSP: u8 = 6;
    pub const SEPARATE_REQ: u8 = 9;
}

/// 回复时回显的 source id 与 transaction id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemBytes {
    pub source_id: u16,
    pub transaction_id: u16,
}

/// 报文头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub device_id: u16,
    pub stream: u8,
    pub wait: bool,
    pub function: u8,
    pub ptype: u8,
    pub stype: u8,
    pub source_id: u16,
    pub transaction_id: u16,
}

impl Header {
    /// 解析完整帧（含长度前缀）的报文头
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let h = frame.get(LENGTH_PREFIX_LEN..FRAME_HEADER_LEN)?;
        Some(Self {
            device_id: u16::from_be_bytes([h[0], h[1]]),
            stream: h[2] & !WAIT_BIT,
            wait: h[2] & WAIT_BIT != 0,
            function: h[3],
            ptype: h[4],
            stype: h[5],
            source_id: u16::from_be_bytes([h[6], h[7]]),
            transaction_id: u16::from_be_bytes([h[8], h[9]]),
        })
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.device_id);
        buf.put_u8(if self.wait {
            self.stream | WAIT_BIT
        } else {
            self.stream
        });
        buf.put_u8(self.function);
        buf.put_u8(self.ptype);
        buf.put_u8(self.stype);
        buf.put_u16(self.source_id);
        buf.put_u16(self.transaction_id);
    }

    /// 数据消息且 stream/function 匹配
    pub fn is(&self, stream: u8, function: u8) -> bool {
        self.stype == stype::DATA && self.stream == stream && self.function == function
    }

    pub fn system_bytes(&self) -> SystemBytes {
        SystemBytes {
            source_id: self.source_id,
            transaction_id: self.transaction_id,
        }
    }
}

/// 收到的一帧
#[derive(Debug, Clone, Copy)]
pub struct Inbound<'a> {
    pub header: Header,
    pub body: &'a [u8],
    pub raw: &'a [u8],
}

impl<'a> Inbound<'a> {
    pub fn parse(raw: &'a [u8]) -> Option<Self> {
        Some(Self {
            header: Header::parse(raw)?,
            body: raw.get(FRAME_HEADER_LEN..)?,
            raw,
        })
    }

    /// 报文体第一个数据项
    pub fn first_item(&self) -> Option<SecsItem> {
        SecsItem::decode(self.body).map(|(item, _)| item)
    }

    pub fn reader(&self) -> ItemReader<'a> {
        ItemReader::new(self.body)
    }

    /// Select.rsp：仅 10 字节头
    pub fn is_select_response(&self) -> bool {
        self.raw.len() == FRAME_HEADER_LEN
            && self.header.device_id == CONTROL_DEVICE_ID
            && self.header.stype == stype::SELECT_RSP
    }

    pub fn is_linktest_response(&self) -> bool {
        self.header.device_id == CONTROL_DEVICE_ID && self.header.stype == stype::LINKTEST_RSP
    }

    /// S1F0 事务失败：整帧恰为 18 字节
    pub fn is_failed_transaction(&self) -> bool {
        self.raw.len() == FRAME_HEADER_LEN + 4 && self.header.is(1, 0)
    }

    /// 单字节 Binary ACK 码（S2F34/S2F36/S2F38/S2F16/S5F4 等）
    pub fn ack_code(&self) -> Option<u8> {
        match self.first_item()? {
            SecsItem::Binary(code) if code.len() == 1 => Some(code[0]),
            _ => None,
        }
    }

    /// S1F14 的 COMMACK（列表首元素）
    pub fn establish_comm_ack(&self) -> Option<u8> {
        match self.first_item()? {
            SecsItem::List(items) => match items.first() {
                Some(SecsItem::Binary(code)) if code.len() == 1 => Some(code[0]),
                _ => None,
            },
            _ => None,
        }
    }
}

/// 出站报文编码器
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    pub equip_device_id: u16,
    pub spark_device_id: u16,
    /// 出站缓冲初始容量
    pub capacity: usize,
}

impl Encoder {
    /// HSMS 控制消息（Select.req / Linktest.req / Separate.req）
    pub fn control(&self, stype: u8, transaction_id: u16) -> Bytes {
        let header = Header {
            device_id: CONTROL_DEVICE_ID,
            stream: 0,
            wait: false,
            function: 0,
            ptype: 0,
            stype,
            source_id: self.spark_device_id,
            transaction_id,
        };
        self.encode(&header, None)
    }

    /// 主动请求：置 W 位，source id 为本端设备 ID
    pub fn request(&self, stream: u8, function: u8, transaction_id: u16, body: &SecsItem) -> Bytes {
        let header = Header {
            device_id: self.equip_device_id,
            stream,
            wait: true,
            function,
            ptype: 0,
            stype: stype::DATA,
            source_id: self.spark_device_id,
            transaction_id,
        };
        self.encode(&header, Some(body))
    }

    /// 回复：回显对端的 system bytes
    pub fn reply(&self, stream: u8, function: u8, to: SystemBytes, body: &SecsItem) -> Bytes {
        let header = Header {
            device_id: self.equip_device_id,
            stream,
            wait: false,
            function,
            ptype: 0,
            stype: stype::DATA,
            source_id: to.source_id,
            transaction_id: to.transaction_id,
        };
        self.encode(&header, Some(body))
    }

    fn encode(&self, header: &Header, body: Option<&SecsItem>) -> Bytes {
        let body_len = body.map(SecsItem::encoded_len).unwrap_or(0);
        let mut buf = BytesMut::with_capacity(self.capacity.max(FRAME_HEADER_LEN + body_len));
        buf.put_u32((HEADER_LEN + body_len) as u32);
        header.write(&mut buf);
        if let Some(body) = body {
            body.encode(&mut buf);
        }
        buf.freeze()
    }
}

/// 固定格式的报文体
pub mod body {
    use super::{ACCEPTED, ENABLE_ALARMS};
    use crate::item::SecsItem;

    /// S1F13：空列表
    pub fn establish_comm_request() -> SecsItem {
        SecsItem::list(vec![])
    }

    /// S1F14：COMMACK + 空 MDLN/SOFTREV 列表
    pub fn establish_comm_ack() -> SecsItem {
        SecsItem::list(vec![SecsItem::binary(ACCEPTED), SecsItem::list(vec![])])
    }

    /// S5F3：ALED + 空 ALID（全部告警）
    pub fn enable_alarms() -> SecsItem {
        SecsItem::list(vec![SecsItem::binary(ENABLE_ALARMS), SecsItem::U4(vec![])])
    }

    /// S1F2 / 空列表
    pub fn online_data() -> SecsItem {
        SecsItem::list(vec![])
    }

    /// S5F2 / S6F12
    pub fn accepted() -> SecsItem {
        SecsItem::binary(ACCEPTED)
    }

    /// S2F15：单个 ECID 写入
    pub fn constant_write(ecid: SecsItem, value: SecsItem) -> SecsItem {
        SecsItem::list(vec![SecsItem::list(vec![ecid, value])])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> Encoder {
        Encoder {
            equip_device_id: 0,
            spark_device_id: 1,
            capacity: 100,
        }
    }

    #[test]
    fn test_select_request_layout() {
        let bytes = encoder().control(stype::SELECT_REQ, 0);
        assert_eq!(
            &bytes[..],
            &[0, 0, 0, 0x0a, 0xff, 0xff, 0, 0, 0, 1, 0, 1, 0, 0]
        );
    }

    #[test]
    fn test_request_sets_wait_bit() {
        let bytes = encoder().request(1, 13, 7, &body::establish_comm_request());
        assert_eq!(
            &bytes[..],
            &[0, 0, 0, 0x0c, 0, 0, 0x81, 13, 0, 0, 0, 1, 0, 7, 0x01, 0x00]
        );
        let inbound = Inbound::parse(&bytes).expect("inbound");
        assert!(inbound.header.wait);
        assert!(inbound.header.is(1, 13));
        assert_eq!(inbound.header.transaction_id, 7);
    }

    #[test]
    fn test_reply_echoes_system_bytes() {
        let to = SystemBytes {
            source_id: 0x1234,
            transaction_id: 0x0042,
        };
        let bytes = encoder().reply(1, 14, to, &body::establish_comm_ack());
        assert_eq!(
            &bytes[..],
            &[0, 0, 0, 0x11, 0, 0, 0x01, 14, 0, 0, 0x12, 0x34, 0x00, 0x42, 0x01, 0x02, 0x21, 0x01, 0x00, 0x01, 0x00]
        );
        let inbound = Inbound::parse(&bytes).expect("inbound");
        assert_eq!(inbound.establish_comm_ack(), Some(ACCEPTED));
    }

    #[test]
    fn test_select_response_and_failed_transaction() {
        let select_rsp = [0u8, 0, 0, 0x0a, 0xff, 0xff, 0, 0, 0, 2, 0, 1, 0, 0];
        assert!(Inbound::parse(&select_rsp).expect("rsp").is_select_response());

        let failed = [0u8, 0, 0, 0x0e, 0, 0, 0x01, 0, 0, 0, 0, 1, 0, 3, 0, 0, 0, 0];
        assert!(Inbound::parse(&failed).expect("f0").is_failed_transaction());
    }

    #[test]
    fn test_ack_code() {
        let bytes = encoder().reply(2, 34, SystemBytes::default(), &body::accepted());
        assert_eq!(Inbound::parse(&bytes).expect("ack").ack_code(), Some(0));
    }
}
