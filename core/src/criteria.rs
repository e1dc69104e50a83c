//! 查询条件抽象
//!
//! [`Criteria`] 由调用方按次构造，引擎只读取其中的条件：
//! 渲染后的 SQL 片段与对应的命名参数。

use crate::record::Params;
use crate::value::BindValue;
use std::fmt;

/// 可渲染为 SQL 布尔表达式的条件
pub trait Condition: Send + Sync + fmt::Debug {
    /// SQL 片段，参数使用 `:name` 形式的命名占位符
    fn render(&self) -> String;

    /// 占位符名（含 `:` 前缀）到值的映射
    fn parameters(&self) -> Params;
}

/// 查询条件容器，可以不带任何条件
#[derive(Debug, Default)]
pub struct Criteria {
    condition: Option<Box<dyn Condition>>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(condition: impl Condition + 'static) -> Self {
        Self {
            condition: Some(Box::new(condition)),
        }
    }

    pub fn condition(&self) -> Option<&dyn Condition> {
        self.condition.as_deref()
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }
}

impl<C: Condition + 'static> From<C> for Criteria {
    fn from(condition: C) -> Self {
        Criteria::with_condition(condition)
    }
}

/// 原样使用的 SQL 片段及其参数
///
/// ```rust,ignore
/// let cond = RawCondition::new("age > :min_age").bind("min_age", 18);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCondition {
    sql: String,
    params: Params,
}

impl RawCondition {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::new(),
        }
    }

    /// 绑定参数，名称可带或不带 `:` 前缀
    ///
    /// `BindValue::Null` 按文本类型的 NULL 绑定。PostgreSQL 上把它与非文本列比较
    /// 会报 `operator does not exist`，判断空值应直接写 `col IS NULL`。
    pub fn bind(mut self, name: &str, value: impl Into<BindValue>) -> Self {
        let name = if name.starts_with(':') {
            name.to_string()
        } else {
            format!(":{}", name)
        };
        self.params.insert(name, value.into());
        self
    }
}

impl Condition for RawCondition {
    fn render(&self) -> String {
        self.sql.clone()
    }

    fn parameters(&self) -> Params {
        self.params.clone()
    }
}
