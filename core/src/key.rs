//! 主键定义与主键值
//!
//! 单列主键与复合主键用两个枚举表达，记录到主键值、主键值到删除条件
//! 之间的转换都是显式函数，不做运行时类型探测。

use crate::error::{CrudError, Result};
use crate::record::Record;
use crate::value::BindValue;
use std::collections::HashSet;

/// 主键定义：单列或有序的多列
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKeySpec {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKeySpec {
    /// 一列时生成 `Single`，多列时生成 `Composite`
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.len() == 1 {
            PrimaryKeySpec::Single(columns.remove(0))
        } else {
            PrimaryKeySpec::Composite(columns)
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKeySpec::Single(column) => vec![column.as_str()],
            PrimaryKeySpec::Composite(columns) => columns.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, PrimaryKeySpec::Composite(_))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let columns = self.columns();
        if columns.is_empty() {
            return Err(CrudError::Configuration(
                "primary key must name at least one column".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in columns {
            if column.trim().is_empty() {
                return Err(CrudError::Configuration(
                    "primary key column name must not be empty".to_string(),
                ));
            }
            if !seen.insert(column) {
                return Err(CrudError::Configuration(format!(
                    "primary key column `{}` is listed more than once",
                    column
                )));
            }
        }
        Ok(())
    }

    /// 从记录中提取主键值
    ///
    /// 单列主键取 `record[col]`；复合主键按主键列顺序投影出子记录。
    pub fn resolve(&self, record: &Record) -> Result<PrimaryKeyValue> {
        match self {
            PrimaryKeySpec::Single(column) => record
                .get(column)
                .cloned()
                .map(PrimaryKeyValue::Scalar)
                .ok_or_else(|| {
                    CrudError::InvalidKey(format!("record has no value for key column `{}`", column))
                }),
            PrimaryKeySpec::Composite(columns) => record
                .project(columns.iter().map(String::as_str))
                .map(PrimaryKeyValue::Keyed)
                .map_err(|missing| {
                    CrudError::InvalidKey(format!(
                        "record has no value for key column `{}`",
                        missing
                    ))
                }),
        }
    }

    /// 把主键值转换成“列 = 值”条件
    ///
    /// - 标量只在主键恰好一列时接受
    /// - 映射必须恰好包含全部主键列，保留调用方给出的列顺序
    pub fn bind(&self, value: PrimaryKeyValue) -> Result<Record> {
        let columns = self.columns();
        match value {
            PrimaryKeyValue::Scalar(scalar) => {
                if columns.len() != 1 {
                    return Err(CrudError::InvalidKey(format!(
                        "scalar value {} cannot address composite key ({})",
                        scalar,
                        columns.join(", ")
                    )));
                }
                let mut conditions = Record::with_capacity(1);
                conditions.insert(columns[0], scalar);
                Ok(conditions)
            }
            PrimaryKeyValue::Keyed(mapping) => {
                for column in &columns {
                    if !mapping.contains(column) {
                        return Err(CrudError::InvalidKey(format!(
                            "missing value for key column `{}`",
                            column
                        )));
                    }
                }
                if let Some(extra) = mapping.columns().find(|c| !columns.contains(c)) {
                    return Err(CrudError::InvalidKey(format!(
                        "`{}` is not a primary key column",
                        extra
                    )));
                }
                Ok(mapping)
            }
        }
    }
}

impl From<&str> for PrimaryKeySpec {
    fn from(column: &str) -> Self {
        PrimaryKeySpec::Single(column.to_string())
    }
}

impl From<String> for PrimaryKeySpec {
    fn from(column: String) -> Self {
        PrimaryKeySpec::Single(column)
    }
}

// 列表形式统一经过 `from_columns`，单列列表也得到 `Single`
impl From<Vec<String>> for PrimaryKeySpec {
    fn from(columns: Vec<String>) -> Self {
        PrimaryKeySpec::from_columns(columns)
    }
}

impl From<Vec<&str>> for PrimaryKeySpec {
    fn from(columns: Vec<&str>) -> Self {
        PrimaryKeySpec::from_columns(columns)
    }
}

impl<const N: usize> From<[&str; N]> for PrimaryKeySpec {
    fn from(columns: [&str; N]) -> Self {
        PrimaryKeySpec::from_columns(columns)
    }
}

/// 主键值：单列主键为标量，复合主键为“列名 → 值”映射
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryKeyValue {
    Scalar(BindValue),
    Keyed(Record),
}

impl PrimaryKeyValue {
    pub fn as_scalar(&self) -> Option<&BindValue> {
        match self {
            PrimaryKeyValue::Scalar(value) => Some(value),
            PrimaryKeyValue::Keyed(_) => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&Record> {
        match self {
            PrimaryKeyValue::Scalar(_) => None,
            PrimaryKeyValue::Keyed(record) => Some(record),
        }
    }
}

impl From<Record> for PrimaryKeyValue {
    fn from(record: Record) -> Self {
        PrimaryKeyValue::Keyed(record)
    }
}

macro_rules! impl_scalar_key_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PrimaryKeyValue {
                fn from(value: $ty) -> Self {
                    PrimaryKeyValue::Scalar(value.into())
                }
            }
        )*
    };
}

impl_scalar_key_from!(BindValue, i64, i32, i16, u32, String, &str);
