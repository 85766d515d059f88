//! 值转换：把解码值按变量声明格式转换为推送值，并把写入值编码为数据项

use crate::error::SecsError;
use crate::item::{SecsItem, SecsValue};
use domain::{Variable, VariableFormat, VariableValue};

/// ASCII 写入值的最大长度
const MAX_WRITE_TEXT_LEN: usize = 255;

/// 按变量格式转换解码值；变量为数组时结果总是数组
pub fn convert(value: &SecsValue, variable: &Variable) -> Option<VariableValue> {
    match value {
        SecsValue::Array(items) if variable.array => items
            .iter()
            .map(|item| convert_scalar(item, variable.format))
            .collect::<Option<Vec<_>>>()
            .map(VariableValue::Array),
        SecsValue::Array(items) => convert_scalar(items.first()?, variable.format),
        scalar if variable.array => {
            convert_scalar(scalar, variable.format).map(|v| VariableValue::Array(vec![v]))
        }
        scalar => convert_scalar(scalar, variable.format),
    }
}

fn convert_scalar(value: &SecsValue, format: VariableFormat) -> Option<VariableValue> {
    let converted = match (value, format) {
        (SecsValue::Text(text), VariableFormat::Char) => VariableValue::String(text.clone()),
        (SecsValue::Text(text), VariableFormat::Bool) => {
            VariableValue::Bool(text == "true" || text == "1")
        }
        (SecsValue::Text(text), f) if f.is_float() => VariableValue::F64(parse_leading_float(text)?),
        (SecsValue::Text(text), _) => VariableValue::I64(parse_leading_int(text)?),

        (SecsValue::Bool(flag), VariableFormat::Char) => {
            VariableValue::String(if *flag { "1" } else { "0" }.to_string())
        }
        (SecsValue::Bool(flag), VariableFormat::Bool) => VariableValue::Bool(*flag),
        (SecsValue::Bool(flag), _) => VariableValue::I64(i64::from(*flag)),

        (SecsValue::Int(n), VariableFormat::Char) => VariableValue::String(n.to_string()),
        (SecsValue::Int(n), VariableFormat::Bool) => VariableValue::Bool(*n != 0),
        (SecsValue::Int(n), _) => VariableValue::I64(*n),
        (SecsValue::UInt(n), VariableFormat::Char) => VariableValue::String(n.to_string()),
        (SecsValue::UInt(n), VariableFormat::Bool) => VariableValue::Bool(*n != 0),
        (SecsValue::UInt(n), _) => VariableValue::U64(*n),
        (SecsValue::Float(n), VariableFormat::Char) => VariableValue::String(n.to_string()),
        (SecsValue::Float(n), VariableFormat::Bool) => VariableValue::Bool(*n != 0.0),
        (SecsValue::Float(n), _) => VariableValue::F64(*n),

        // 嵌套列表不支持标量转换
        (SecsValue::Array(_), _) => return None,
    };
    Some(converted)
}

/// 解析字符串开头的十进制整数（允许前导空白与符号，忽略后续字符）
fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['+', '-']));
    let digits = trimmed[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    trimmed[..sign_len + digits].parse().ok()
}

/// 解析字符串开头的浮点数（忽略后续字符）
fn parse_leading_float(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let candidate_len = trimmed
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .map(|(index, c)| index + c.len_utf8())
        .last()?;
    // 从最长前缀开始回退，直到得到合法数字
    (1..=candidate_len)
        .rev()
        .find_map(|len| trimmed[..len].parse::<f64>().ok())
}

/// 把写入值编码为变量格式对应的数据项（S2F15）
pub fn encode_write_value(variable: &Variable, value: &VariableValue) -> Result<SecsItem, SecsError> {
    let invalid = || SecsError::InvalidWriteValue(variable.name.clone(), format!("{:?}", variable.format));
    let item = match variable.format {
        VariableFormat::Char => {
            let mut text = value.to_string();
            if text.len() > MAX_WRITE_TEXT_LEN {
                let mut end = MAX_WRITE_TEXT_LEN;
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                text.truncate(end);
            }
            SecsItem::Ascii(text)
        }
        VariableFormat::Bool => SecsItem::boolean(value.as_bool().ok_or_else(invalid)?),
        VariableFormat::Int8 => SecsItem::I1(vec![narrow(value.as_i64(), invalid)?]),
        VariableFormat::Int16 => SecsItem::I2(vec![narrow(value.as_i64(), invalid)?]),
        VariableFormat::Int32 => SecsItem::I4(vec![narrow(value.as_i64(), invalid)?]),
        VariableFormat::Int64 => SecsItem::I8(vec![value.as_i64().ok_or_else(invalid)?]),
        VariableFormat::Uint8 => SecsItem::U1(vec![narrow(value.as_u64(), invalid)?]),
        VariableFormat::Uint16 => SecsItem::U2(vec![narrow(value.as_u64(), invalid)?]),
        VariableFormat::Uint32 => SecsItem::U4(vec![narrow(value.as_u64(), invalid)?]),
        VariableFormat::Uint64 => SecsItem::U8(vec![value.as_u64().ok_or_else(invalid)?]),
        VariableFormat::Float => SecsItem::F4(vec![value.as_f64().ok_or_else(invalid)? as f32]),
        VariableFormat::Double => SecsItem::F8(vec![value.as_f64().ok_or_else(invalid)?]),
    };
    Ok(item)
}

fn narrow<S, T: TryFrom<S>>(
    value: Option<S>,
    invalid: impl Fn() -> SecsError,
) -> Result<T, SecsError> {
    value
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(invalid)
}

/// ECID 能放入 U2 时按 U2 编码，否则用 U4
pub fn ecid_item(numeric_id: u32) -> SecsItem {
    match u16::try_from(numeric_id) {
        Ok(ecid) => SecsItem::U2(vec![ecid]),
        Err(_) => SecsItem::u4(numeric_id),
    }
}
