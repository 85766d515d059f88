use serde::Serialize;
use std::fmt;

/// 推送给数据写入回调的变量值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    String(String),
    Array(Vec<VariableValue>),
}

impl VariableValue {
    /// 按有符号整数读取（字符串按十进制解析）。
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            Self::U64(v) => i64::try_from(*v).ok(),
            Self::F64(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::String(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// 按无符号整数读取。
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::I64(v) => u64::try_from(*v).ok(),
            Self::U64(v) => Some(*v),
            Self::F64(v) if v.fract() == 0.0 && *v >= 0.0 => Some(*v as u64),
            Self::Bool(v) => Some(u64::from(*v)),
            Self::String(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I64(v) => Some(*v as f64),
            Self::U64(v) => Some(*v as f64),
            Self::F64(v) => Some(*v),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::String(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// 按布尔读取：数值非零为真，字符串仅 "true"/"1" 为真。
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::I64(v) => Some(*v != 0),
            Self::U64(v) => Some(*v != 0),
            Self::F64(v) => Some(*v != 0.0),
            Self::String(v) => Some(v == "true" || v == "1"),
            Self::Array(_) => None,
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}
