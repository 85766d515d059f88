//! SECS-II 数据项编解码
//!
//! 每个数据项 = 格式字节 `(类型 | 长度字节数)` + 大端长度 + 负载。
//! 格式字节低 2 位表示长度字段占 1/2/3 字节；列表的长度是元素个数，
//! 其余类型的长度是负载字节数。

use bytes::{BufMut, BytesMut};

/// 列表嵌套上限，防止畸形报文导致递归过深
const MAX_LIST_DEPTH: usize = 32;

/// 数据项类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFormat {
    List = 0x00,
    Binary = 0x20,
    Boolean = 0x24,
    Ascii = 0x40,
    I8 = 0x60,
    I1 = 0x64,
    I2 = 0x68,
    I4 = 0x70,
    F8 = 0x80,
    F4 = 0x90,
    U8 = 0xA0,
    U1 = 0xA4,
    U2 = 0xA8,
    U4 = 0xB0,
}

impl ItemFormat {
    /// 从格式字节解析类型（忽略低 2 位）
    pub fn from_code(code: u8) -> Option<Self> {
        let format = match code & !0x03 {
            0x00 => Self::List,
            0x20 => Self::Binary,
            0x24 => Self::Boolean,
            0x40 => Self::Ascii,
            0x60 => Self::I8,
            0x64 => Self::I1,
            0x68 => Self::I2,
            0x70 => Self::I4,
            0x80 => Self::F8,
            0x90 => Self::F4,
            0xA0 => Self::U8,
            0xA4 => Self::U1,
            0xA8 => Self::U2,
            0xB0 => Self::U4,
            _ => return None,
        };
        Some(format)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// 单个元素字节宽度（列表为 0）
    pub fn element_width(self) -> usize {
        match self {
            Self::List => 0,
            Self::Binary | Self::Boolean | Self::Ascii | Self::I1 | Self::U1 => 1,
            Self::I2 | Self::U2 => 2,
            Self::I4 | Self::U4 | Self::F4 => 4,
            Self::I8 | Self::U8 | Self::F8 => 8,
        }
    }
}

/// 线上数据项
#[derive(Debug, Clone, PartialEq)]
pub enum SecsItem {
    List(Vec<SecsItem>),
    Binary(Vec<u8>),
    Boolean(Vec<bool>),
    Ascii(String),
    I1(Vec<i8>),
    I2(Vec<i16>),
    I4(Vec<i32>),
    I8(Vec<i64>),
    U1(Vec<u8>),
    U2(Vec<u16>),
    U4(Vec<u32>),
    U8(Vec<u64>),
    F4(Vec<f32>),
    F8(Vec<f64>),
}

/// 解码后的标记值，由转换层按变量格式再处理
#[derive(Debug, Clone, PartialEq)]
pub enum SecsValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Array(Vec<SecsValue>),
}

impl SecsItem {
    pub fn list(items: Vec<SecsItem>) -> Self {
        Self::List(items)
    }

    pub fn u4(value: u32) -> Self {
        Self::U4(vec![value])
    }

    pub fn binary(value: u8) -> Self {
        Self::Binary(vec![value])
    }

    pub fn boolean(value: bool) -> Self {
        Self::Boolean(vec![value])
    }

    pub fn format(&self) -> ItemFormat {
        match self {
            Self::List(_) => ItemFormat::List,
            Self::Binary(_) => ItemFormat::Binary,
            Self::Boolean(_) => ItemFormat::Boolean,
            Self::Ascii(_) => ItemFormat::Ascii,
            Self::I1(_) => ItemFormat::I1,
            Self::I2(_) => ItemFormat::I2,
            Self::I4(_) => ItemFormat::I4,
            Self::I8(_) => ItemFormat::I8,
            Self::U1(_) => ItemFormat::U1,
            Self::U2(_) => ItemFormat::U2,
            Self::U4(_) => ItemFormat::U4,
            Self::U8(_) => ItemFormat::U8,
            Self::F4(_) => ItemFormat::F4,
            Self::F8(_) => ItemFormat::F8,
        }
    }

    /// 长度字段的值：列表为元素个数，其余为负载字节数
    fn length_field(&self) -> usize {
        let count = match self {
            Self::List(items) => return items.len(),
            Self::Ascii(text) => return text.len(),
            Self::Binary(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::I1(v) => v.len(),
            Self::I2(v) => v.len(),
            Self::I4(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U1(v) => v.len(),
            Self::U2(v) => v.len(),
            Self::U4(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::F4(v) => v.len(),
            Self::F8(v) => v.len(),
        };
        count * self.format().element_width()
    }

    /// 编码后的总字节数
    pub fn encoded_len(&self) -> usize {
        let length = self.length_field();
        let header = 1 + length_bytes(length);
        match self {
            Self::List(items) => header + items.iter().map(SecsItem::encoded_len).sum::<usize>(),
            _ => header + length,
        }
    }

    /// 追加编码到缓冲区
    pub fn encode(&self, buf: &mut BytesMut) {
        write_header(buf, self.format(), self.length_field());
        match self {
            Self::List(items) => items.iter().for_each(|item| item.encode(buf)),
            Self::Binary(v) => buf.put_slice(v),
            Self::Boolean(v) => v.iter().for_each(|b| buf.put_u8(u8::from(*b))),
            Self::Ascii(text) => buf.put_slice(text.as_bytes()),
            Self::I1(v) => v.iter().for_each(|x| buf.put_i8(*x)),
            Self::I2(v) => v.iter().for_each(|x| buf.put_i16(*x)),
            Self::I4(v) => v.iter().for_each(|x| buf.put_i32(*x)),
            Self::I8(v) => v.iter().for_each(|x| buf.put_i64(*x)),
            Self::U1(v) => buf.put_slice(v),
            Self::U2(v) => v.iter().for_each(|x| buf.put_u16(*x)),
            Self::U4(v) => v.iter().for_each(|x| buf.put_u32(*x)),
            Self::U8(v) => v.iter().for_each(|x| buf.put_u64(*x)),
            Self::F4(v) => v.iter().for_each(|x| buf.put_f32(*x)),
            Self::F8(v) => v.iter().for_each(|x| buf.put_f64(*x)),
        }
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// 从缓冲区头部解码一个数据项，返回数据项与消耗的字节数
    ///
    /// 缓冲区截断、长度字节数为 0、未知标签或负载长度不是元素宽度整数倍时返回 `None`。
    pub fn decode(buf: &[u8]) -> Option<(SecsItem, usize)> {
        decode_at_depth(buf, 0)
    }

    /// 转换为标记值：单元素数值项返回标量，其余返回数组
    pub fn value(&self) -> SecsValue {
        match self {
            Self::List(items) => SecsValue::Array(items.iter().map(SecsItem::value).collect()),
            Self::Ascii(text) => SecsValue::Text(text.clone()),
            Self::Binary(v) => collapse(v.as_slice(), |x| SecsValue::UInt(u64::from(*x))),
            Self::Boolean(v) => collapse(v.as_slice(), |x| SecsValue::Bool(*x)),
            Self::I1(v) => collapse(v.as_slice(), |x| SecsValue::Int(i64::from(*x))),
            Self::I2(v) => collapse(v.as_slice(), |x| SecsValue::Int(i64::from(*x))),
            Self::I4(v) => collapse(v.as_slice(), |x| SecsValue::Int(i64::from(*x))),
            Self::I8(v) => collapse(v.as_slice(), |x| SecsValue::Int(*x)),
            Self::U1(v) => collapse(v.as_slice(), |x| SecsValue::UInt(u64::from(*x))),
            Self::U2(v) => collapse(v.as_slice(), |x| SecsValue::UInt(u64::from(*x))),
            Self::U4(v) => collapse(v.as_slice(), |x| SecsValue::UInt(u64::from(*x))),
            Self::U8(v) => collapse(v.as_slice(), |x| SecsValue::UInt(*x)),
            Self::F4(v) => collapse(v.as_slice(), |x| SecsValue::Float(f64::from(*x))),
            Self::F8(v) => collapse(v.as_slice(), |x| SecsValue::Float(*x)),
        }
    }
}

fn collapse<T>(values: &[T], map: impl Fn(&T) -> SecsValue) -> SecsValue {
    match values {
        [single] => map(single),
        _ => SecsValue::Array(values.iter().map(map).collect()),
    }
}

fn length_bytes(length: usize) -> usize {
    if length < 0x100 {
        1
    } else if length < 0x1_0000 {
        2
    } else {
        3
    }
}

fn write_header(buf: &mut BytesMut, format: ItemFormat, length: usize) {
    match length_bytes(length) {
        1 => {
            buf.put_u8(format.code() | 1);
            buf.put_u8(length as u8);
        }
        2 => {
            buf.put_u8(format.code() | 2);
            buf.put_u16(length as u16);
        }
        _ => {
            buf.put_u8(format.code() | 3);
            buf.put_u8((length >> 16) as u8);
            buf.put_u16(length as u16);
        }
    }
}

/// 读取数据项头：(类型, 长度字段, 头部字节数)
fn read_header(buf: &[u8]) -> Option<(ItemFormat, usize, usize)> {
    let first = *buf.first()?;
    let format = ItemFormat::from_code(first)?;
    let count = usize::from(first & 0x03);
    if count == 0 {
        return None;
    }
    let length = buf
        .get(1..1 + count)?
        .iter()
        .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
    Some((format, length, 1 + count))
}

fn decode_at_depth(buf: &[u8], depth: usize) -> Option<(SecsItem, usize)> {
    let (format, length, header) = read_header(buf)?;

    if format == ItemFormat::List {
        if depth >= MAX_LIST_DEPTH {
            return None;
        }
        let mut items = Vec::with_capacity(length.min(buf.len()));
        let mut pos = header;
        for _ in 0..length {
            let (item, used) = decode_at_depth(buf.get(pos..)?, depth + 1)?;
            items.push(item);
            pos += used;
        }
        return Some((SecsItem::List(items), pos));
    }

    let payload = buf.get(header..header + length)?;
    if length % format.element_width() != 0 {
        return None;
    }
    let item = match format {
        ItemFormat::List => return None,
        ItemFormat::Binary => SecsItem::Binary(payload.to_vec()),
        ItemFormat::Boolean => SecsItem::Boolean(payload.iter().map(|b| *b != 0).collect()),
        ItemFormat::Ascii => SecsItem::Ascii(String::from_utf8_lossy(payload).into_owned()),
        ItemFormat::I1 => SecsItem::I1(payload.iter().map(|b| *b as i8).collect()),
        ItemFormat::U1 => SecsItem::U1(payload.to_vec()),
        ItemFormat::I2 => SecsItem::I2(read_be(payload, i16::from_be_bytes)),
        ItemFormat::I4 => SecsItem::I4(read_be(payload, i32::from_be_bytes)),
        ItemFormat::I8 => SecsItem::I8(read_be(payload, i64::from_be_bytes)),
        ItemFormat::U2 => SecsItem::U2(read_be(payload, u16::from_be_bytes)),
        ItemFormat::U4 => SecsItem::U4(read_be(payload, u32::from_be_bytes)),
        ItemFormat::U8 => SecsItem::U8(read_be(payload, u64::from_be_bytes)),
        ItemFormat::F4 => SecsItem::F4(read_be(payload, f32::from_be_bytes)),
        ItemFormat::F8 => SecsItem::F8(read_be(payload, f64::from_be_bytes)),
    };
    Some((item, header + length))
}

/// 定宽大端读取，调用前已保证负载长度是 N 的整数倍
fn read_be<T, const N: usize>(payload: &[u8], convert: fn([u8; N]) -> T) -> Vec<T> {
    payload
        .chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            convert(bytes)
        })
        .collect()
}

/// 报文体的顺序读取游标
///
/// 响应处理按位置逐个读取元素；某个元素解码失败只影响该元素，
/// 游标尽量跳过它，无法确定边界时游标移到末尾。
pub struct ItemReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ItemReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// 读取列表头，返回元素个数
    pub fn read_list_header(&mut self) -> Option<usize> {
        let (format, length, header) = read_header(self.buf.get(self.pos..)?)?;
        if format != ItemFormat::List {
            return None;
        }
        self.pos += header;
        Some(length)
    }

    /// 读取一个完整数据项
    pub fn read_item(&mut self) -> Option<SecsItem> {
        let rest = self.buf.get(self.pos..)?;
        match SecsItem::decode(rest) {
            Some((item, used)) => {
                self.pos += used;
                Some(item)
            }
            None => {
                self.skip_undecodable(rest);
                None
            }
        }
    }

    /// 读取单元素无符号 ID（U1/U2/U4，设备对 DATAID/CEID/RPTID 的宽度各不相同）
    pub fn read_id(&mut self) -> Option<u32> {
        match self.read_item()? {
            SecsItem::U4(values) if values.len() == 1 => Some(values[0]),
            SecsItem::U2(values) if values.len() == 1 => Some(u32::from(values[0])),
            SecsItem::U1(values) if values.len() == 1 => Some(u32::from(values[0])),
            _ => None,
        }
    }

    fn skip_undecodable(&mut self, rest: &[u8]) {
        match read_header(rest) {
            Some((format, length, header))
                if format != ItemFormat::List && header + length <= rest.len() =>
            {
                self.pos += header + length;
            }
            _ => self.pos = self.buf.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(item: SecsItem) {
        let bytes = item.to_bytes();
        assert_eq!(bytes.len(), item.encoded_len());
        let (decoded, used) = SecsItem::decode(&bytes).expect("decode");
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_round_trip_every_tag() {
        round_trip(SecsItem::Binary(vec![0x80]));
        round_trip(SecsItem::Boolean(vec![true, false]));
        round_trip(SecsItem::Ascii("alarm text".to_string()));
        round_trip(SecsItem::I1(vec![-5]));
        round_trip(SecsItem::I2(vec![1234, -2]));
        round_trip(SecsItem::I4(vec![-70000]));
        round_trip(SecsItem::I8(vec![i64::MIN, i64::MAX]));
        round_trip(SecsItem::U1(vec![255]));
        round_trip(SecsItem::U2(vec![65535, 1]));
        round_trip(SecsItem::U4(vec![3000]));
        round_trip(SecsItem::U8(vec![u64::MAX]));
        round_trip(SecsItem::F4(vec![23.0, -1.5]));
        round_trip(SecsItem::F8(vec![std::f64::consts::PI]));
        round_trip(SecsItem::list(vec![
            SecsItem::u4(1),
            SecsItem::list(vec![SecsItem::Ascii(String::new()), SecsItem::U4(vec![])]),
        ]));
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(&SecsItem::u4(3000).to_bytes()[..], &[0xB1, 0x04, 0x00, 0x00, 0x0B, 0xB8]);
        assert_eq!(&SecsItem::U4(vec![]).to_bytes()[..], &[0xB1, 0x00]);
        assert_eq!(&SecsItem::list(vec![]).to_bytes()[..], &[0x01, 0x00]);
        assert_eq!(&SecsItem::boolean(true).to_bytes()[..], &[0x25, 0x01, 0x01]);
    }

    #[test]
    fn test_long_items_use_wider_length_field() {
        let list = SecsItem::list((0..300).map(SecsItem::u4).collect());
        let bytes = list.to_bytes();
        assert_eq!(&bytes[..3], &[0x02, 0x01, 0x2C]);
        round_trip(list);

        let text = SecsItem::Ascii("x".repeat(70_000));
        let bytes = text.to_bytes();
        assert_eq!(&bytes[..4], &[0x43, 0x01, 0x11, 0x70]);
        round_trip(text);
    }

    #[test]
    fn test_value_collapses_single_elements() {
        assert_eq!(SecsItem::I2(vec![1234]).value(), SecsValue::Int(1234));
        assert_eq!(SecsItem::F4(vec![23.0]).value(), SecsValue::Float(23.0));
        assert_eq!(
            SecsItem::U2(vec![1, 2]).value(),
            SecsValue::Array(vec![SecsValue::UInt(1), SecsValue::UInt(2)])
        );
        assert_eq!(SecsItem::U4(vec![]).value(), SecsValue::Array(vec![]));
        assert_eq!(SecsItem::U8(vec![u64::MAX]).value(), SecsValue::UInt(u64::MAX));
        assert_eq!(SecsItem::I8(vec![-1]).value(), SecsValue::Int(-1));
    }

    #[test]
    fn test_decode_failures() {
        // 截断
        assert!(SecsItem::decode(&[0xB1, 0x04, 0x00, 0x00]).is_none());
        // 长度字节数为 0
        assert!(SecsItem::decode(&[0xB0, 0x04, 0, 0, 0, 1]).is_none());
        // 未知标签
        assert!(SecsItem::decode(&[0xFD, 0x01, 0x00]).is_none());
        // 负载不是元素宽度整数倍
        assert!(SecsItem::decode(&[0x69, 0x03, 0, 1, 2]).is_none());
        // 列表元素截断
        assert!(SecsItem::decode(&[0x01, 0x02, 0xB1, 0x04, 0, 0, 0, 1]).is_none());
    }

    #[test]
    fn test_reader_skips_bad_element() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x01, 0x03]);
        SecsItem::I2(vec![7]).encode(&mut buf);
        buf.put_slice(&[0x69, 0x03, 0, 1, 2]);
        SecsItem::F4(vec![2.5]).encode(&mut buf);

        let mut reader = ItemReader::new(&buf);
        assert_eq!(reader.read_list_header(), Some(3));
        assert_eq!(reader.read_item(), Some(SecsItem::I2(vec![7])));
        assert_eq!(reader.read_item(), None);
        assert_eq!(reader.read_item(), Some(SecsItem::F4(vec![2.5])));
        assert!(reader.is_empty());
    }
}
