//! 绑定值：记录、主键与条件参数共用的标量类型

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;

/// 绑定值，用于安全地传递参数
///
/// 行数据、主键值和条件参数都以 `BindValue` 表示，
/// 最终由执行器按驱动类型绑定到语句上。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Int64(i64),
    Float64(f64),
    String(String),
    Bool(bool),
    Bytes(Vec<u8>),
    /// DECIMAL / NUMERIC 列
    Decimal(BigDecimal),
    /// DATETIME / TIMESTAMP 列（不带时区）
    Timestamp(NaiveDateTime),
}

impl BindValue {
    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BindValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BindValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BindValue::Bool(b) => Some(*b),
            BindValue::Int64(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// 渲染为 SQL 字面量，供 `Display` 使用（错误信息中的主键值），不参与语句执行
    pub fn to_sql_value(&self) -> String {
        match self {
            BindValue::Null => "NULL".to_string(),
            BindValue::Int64(i) => i.to_string(),
            BindValue::Float64(f) => f.to_string(),
            BindValue::String(s) => format!("'{}'", s.replace('\'', "''")),
            BindValue::Bool(b) => b.to_string(),
            BindValue::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                format!("X'{}'", hex)
            }
            BindValue::Decimal(d) => d.to_string(),
            BindValue::Timestamp(t) => format!("'{}'", t.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_value())
    }
}

impl From<BindValue> for serde_json::Value {
    fn from(value: BindValue) -> Self {
        match value {
            BindValue::Null => serde_json::Value::Null,
            BindValue::Int64(i) => serde_json::Value::from(i),
            BindValue::Float64(f) => serde_json::Value::from(f),
            BindValue::String(s) => serde_json::Value::String(s),
            BindValue::Bool(b) => serde_json::Value::Bool(b),
            BindValue::Bytes(b) => serde_json::Value::from(b),
            BindValue::Decimal(d) => serde_json::Value::String(d.to_string()),
            BindValue::Timestamp(t) => {
                serde_json::Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
        }
    }
}

// 整数统一放宽到 i64，三种数据库都支持
macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for BindValue {
                fn from(i: $ty) -> Self {
                    BindValue::Int64(i64::from(i))
                }
            }
        )*
    };
}

impl_from_int!(i64, i32, i16, i8, u32, u16, u8);

impl From<f64> for BindValue {
    fn from(f: f64) -> Self {
        BindValue::Float64(f)
    }
}

impl From<f32> for BindValue {
    fn from(f: f32) -> Self {
        BindValue::Float64(f64::from(f))
    }
}

impl From<bool> for BindValue {
    fn from(b: bool) -> Self {
        BindValue::Bool(b)
    }
}

impl From<String> for BindValue {
    fn from(s: String) -> Self {
        BindValue::String(s)
    }
}

impl From<&str> for BindValue {
    fn from(s: &str) -> Self {
        BindValue::String(s.to_string())
    }
}

impl From<&String> for BindValue {
    fn from(s: &String) -> Self {
        BindValue::String(s.clone())
    }
}

impl From<Vec<u8>> for BindValue {
    fn from(b: Vec<u8>) -> Self {
        BindValue::Bytes(b)
    }
}

impl From<&[u8]> for BindValue {
    fn from(b: &[u8]) -> Self {
        BindValue::Bytes(b.to_vec())
    }
}

impl From<BigDecimal> for BindValue {
    fn from(d: BigDecimal) -> Self {
        BindValue::Decimal(d)
    }
}

impl From<NaiveDateTime> for BindValue {
    fn from(t: NaiveDateTime) -> Self {
        BindValue::Timestamp(t)
    }
}

impl From<DateTime<Utc>> for BindValue {
    fn from(t: DateTime<Utc>) -> Self {
        BindValue::Timestamp(t.naive_utc())
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => BindValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_bind_value_from_integers() {
        assert_eq!(BindValue::from(7i8), BindValue::Int64(7));
        assert_eq!(BindValue::from(300u16), BindValue::Int64(300));
        assert_eq!(BindValue::from(u32::MAX), BindValue::Int64(4_294_967_295));
    }

    #[test]
    fn test_bind_value_from_option() {
        assert_eq!(BindValue::from(Some("a")), BindValue::String("a".to_string()));
        assert_eq!(BindValue::from(Option::<i64>::None), BindValue::Null);
    }

    #[test]
    fn test_to_sql_value_escapes_quotes() {
        assert_eq!(BindValue::from("O'Hara").to_sql_value(), "'O''Hara'");
        assert_eq!(BindValue::Bytes(vec![0x0a, 0xff]).to_sql_value(), "X'0AFF'");
        assert_eq!(BindValue::Null.to_string(), "NULL");
    }

    #[test]
    fn test_into_json() {
        let decimal = BigDecimal::from_str("12.50").unwrap();
        assert_eq!(
            serde_json::Value::from(BindValue::Decimal(decimal)),
            serde_json::json!("12.50")
        );
        assert_eq!(
            serde_json::Value::from(BindValue::Int64(3)),
            serde_json::json!(3)
        );
    }

    #[test]
    fn test_as_bool_accepts_integer_flags() {
        assert_eq!(BindValue::Int64(0).as_bool(), Some(false));
        assert_eq!(BindValue::Int64(1).as_bool(), Some(true));
        assert_eq!(BindValue::from("yes").as_bool(), None);
    }
}
