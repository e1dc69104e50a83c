//! 行记录与命名参数

use crate::value::BindValue;
use indexmap::IndexMap;
use serde::Serialize;

/// 命名参数：占位符名（含 `:` 前缀）到绑定值的有序映射
pub type Params = IndexMap<String, BindValue>;

/// 构建 [`Record`]
///
/// ```rust,ignore
/// let row = sqlxcrud::record! { "id" => 1, "name" => "alice" };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(
            record.insert($column, $value);
        )+
        record
    }};
}

/// 一行数据：列名到绑定值的有序映射
///
/// 保留插入顺序，条件渲染与复合主键投影都依赖这个顺序。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    columns: IndexMap<String, BindValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: IndexMap::with_capacity(capacity),
        }
    }

    /// 写入一列；列已存在时覆盖值并保持原位置，返回旧值
    pub fn insert(
        &mut self,
        column: impl Into<String>,
        value: impl Into<BindValue>,
    ) -> Option<BindValue> {
        self.columns.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&BindValue> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// 删除一列，其余列保持原有顺序
    pub fn remove(&mut self, column: &str) -> Option<BindValue> {
        self.columns.shift_remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 按给定列顺序投影出子记录；任一列缺失时返回缺失的列名
    pub fn project<'a, I>(&self, columns: I) -> std::result::Result<Record, &'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut projected = Record::new();
        for column in columns {
            let value = self.columns.get(column).ok_or(column)?;
            projected.insert(column, value.clone());
        }
        Ok(projected)
    }

    /// 按列过滤，保留原有顺序
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &BindValue) -> bool) {
        self.columns.retain(|k, v| keep(k, v));
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<BindValue>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, BindValue);
    type IntoIter = indexmap::map::IntoIter<String, BindValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a BindValue);
    type IntoIter = indexmap::map::Iter<'a, String, BindValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
