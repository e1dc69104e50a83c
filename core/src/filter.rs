use crate::criteria::Condition;
use crate::record::Params;
use crate::value::BindValue;

/// 条件类型：AND 或 OR
#[derive(Debug, Clone, Copy, PartialEq)]
enum ConditionType {
    And,
    Or,
}

/// SQL 操作符，携带已分配的命名占位符
#[derive(Debug, Clone, PartialEq)]
enum Operator {
    /// 等于: =
    Eq(String),
    /// 不等于: !=
    Ne(String),
    /// 大于: >
    Gt(String),
    /// 大于等于: >=
    Ge(String),
    /// 小于: <
    Lt(String),
    /// 小于等于: <=
    Le(String),
    /// LIKE 匹配
    Like(String),
    IsNull,
    IsNotNull,
    /// IN (:a, :a_1, ...)
    In(Vec<String>),
    /// NOT IN (:a, :a_1, ...)
    NotIn(Vec<String>),
    /// BETWEEN :a AND :a_1
    Between(String, String),
}

impl Operator {
    fn to_sql(&self, field: &str) -> String {
        match self {
            Operator::Eq(p) => format!("{} = {}", field, p),
            Operator::Ne(p) => format!("{} != {}", field, p),
            Operator::Gt(p) => format!("{} > {}", field, p),
            Operator::Ge(p) => format!("{} >= {}", field, p),
            Operator::Lt(p) => format!("{} < {}", field, p),
            Operator::Le(p) => format!("{} <= {}", field, p),
            Operator::Like(p) => format!("{} LIKE {}", field, p),
            Operator::IsNull => format!("{} IS NULL", field),
            Operator::IsNotNull => format!("{} IS NOT NULL", field),
            // 空列表：IN 恒假，NOT IN 恒真
            Operator::In(ps) if ps.is_empty() => "1 = 0".to_string(),
            Operator::NotIn(ps) if ps.is_empty() => "1 = 1".to_string(),
            Operator::In(ps) => format!("{} IN ({})", field, ps.join(", ")),
            Operator::NotIn(ps) => format!("{} NOT IN ({})", field, ps.join(", ")),
            Operator::Between(min, max) => format!("{} BETWEEN {} AND {}", field, min, max),
        }
    }
}

/// 条件项：可以是单个条件或条件组
#[derive(Debug, Clone)]
enum ConditionItem {
    Single(String, Operator, ConditionType),
    Group(Vec<ConditionItem>, ConditionType),
}

impl ConditionItem {
    fn condition_type(&self) -> ConditionType {
        match self {
            ConditionItem::Single(_, _, ct) | ConditionItem::Group(_, ct) => *ct,
        }
    }
}

/// 链式条件构建器
///
/// 每个绑定值都分配一个以列名命名的占位符，同名时追加 `_1`、`_2` 后缀，
/// 嵌套分组与外层共用同一个参数命名空间。
///
/// ```rust,ignore
/// let filter = Filter::new()
///     .and_eq("status", 1)
///     .or_group(|g| g.and_gt("age", 18).and_lt("age", 65));
/// // status = :status OR (age > :age AND age < :age_1)
/// ```
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<ConditionItem>,
    params: Params,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// 为列分配一个尚未使用的占位符并记录绑定值
    fn push_param(&mut self, field: &str, value: BindValue) -> String {
        let base = placeholder_base(field);
        let mut name = format!(":{}", base);
        let mut suffix = 0;
        while self.params.contains_key(&name) {
            suffix += 1;
            name = format!(":{}_{}", base, suffix);
        }
        self.params.insert(name.clone(), value);
        name
    }

    fn push_compare(
        mut self,
        field: &str,
        value: BindValue,
        op: fn(String) -> Operator,
        ct: ConditionType,
    ) -> Self {
        let name = self.push_param(field, value);
        self.conditions
            .push(ConditionItem::Single(field.to_string(), op(name), ct));
        self
    }

    fn push_in(
        mut self,
        field: &str,
        values: Vec<BindValue>,
        negate: bool,
        ct: ConditionType,
    ) -> Self {
        let names: Vec<String> = values
            .into_iter()
            .map(|v| self.push_param(field, v))
            .collect();
        let op = if negate {
            Operator::NotIn(names)
        } else {
            Operator::In(names)
        };
        self.conditions
            .push(ConditionItem::Single(field.to_string(), op, ct));
        self
    }

    fn push_between(
        mut self,
        field: &str,
        min: BindValue,
        max: BindValue,
        ct: ConditionType,
    ) -> Self {
        let min_name = self.push_param(field, min);
        let max_name = self.push_param(field, max);
        self.conditions.push(ConditionItem::Single(
            field.to_string(),
            Operator::Between(min_name, max_name),
            ct,
        ));
        self
    }

    fn push_group<F>(mut self, f: F, ct: ConditionType) -> Self
    where
        F: FnOnce(Filter) -> Filter,
    {
        let group = f(Filter {
            conditions: Vec::new(),
            params: std::mem::take(&mut self.params),
        });
        self.params = group.params;
        if !group.conditions.is_empty() {
            self.conditions
                .push(ConditionItem::Group(group.conditions, ct));
        }
        self
    }

    // ========== AND 条件方法 ==========
    pub fn and_eq(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Eq, ConditionType::And)
    }

    pub fn and_ne(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Ne, ConditionType::And)
    }

    pub fn and_gt(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Gt, ConditionType::And)
    }

    pub fn and_ge(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Ge, ConditionType::And)
    }

    pub fn and_lt(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Lt, ConditionType::And)
    }

    pub fn and_le(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Le, ConditionType::And)
    }

    /// LIKE 模糊匹配（%value%）
    pub fn and_like(self, field: &str, value: impl Into<String>) -> Self {
        let pattern = BindValue::String(format!("%{}%", value.into()));
        self.push_compare(field, pattern, Operator::Like, ConditionType::And)
    }

    /// LIKE 前缀匹配（value%）
    pub fn and_like_prefix(self, field: &str, value: impl Into<String>) -> Self {
        let pattern = BindValue::String(format!("{}%", value.into()));
        self.push_compare(field, pattern, Operator::Like, ConditionType::And)
    }

    pub fn and_in(self, field: &str, values: Vec<impl Into<BindValue>>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in(field, values, false, ConditionType::And)
    }

    pub fn and_not_in(self, field: &str, values: Vec<impl Into<BindValue>>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in(field, values, true, ConditionType::And)
    }

    pub fn and_is_null(mut self, field: &str) -> Self {
        self.conditions.push(ConditionItem::Single(
            field.to_string(),
            Operator::IsNull,
            ConditionType::And,
        ));
        self
    }

    pub fn and_is_not_null(mut self, field: &str) -> Self {
        self.conditions.push(ConditionItem::Single(
            field.to_string(),
            Operator::IsNotNull,
            ConditionType::And,
        ));
        self
    }

    /// BETWEEN 范围查询
    pub fn and_between(
        self,
        field: &str,
        min: impl Into<BindValue>,
        max: impl Into<BindValue>,
    ) -> Self {
        self.push_between(field, min.into(), max.into(), ConditionType::And)
    }

    /// AND 条件分组
    /// 示例：`filter.and_group(|g| g.and_eq("a", 1).or_eq("b", 2))`
    /// 生成：`(a = :a OR b = :b)`
    pub fn and_group<F>(self, f: F) -> Self
    where
        F: FnOnce(Filter) -> Filter,
    {
        self.push_group(f, ConditionType::And)
    }

    // ========== OR 条件方法 ==========
    pub fn or_eq(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Eq, ConditionType::Or)
    }

    pub fn or_ne(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Ne, ConditionType::Or)
    }

    pub fn or_gt(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Gt, ConditionType::Or)
    }

    pub fn or_ge(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Ge, ConditionType::Or)
    }

    pub fn or_lt(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Lt, ConditionType::Or)
    }

    pub fn or_le(self, field: &str, value: impl Into<BindValue>) -> Self {
        self.push_compare(field, value.into(), Operator::Le, ConditionType::Or)
    }

    pub fn or_like(self, field: &str, value: impl Into<String>) -> Self {
        let pattern = BindValue::String(format!("%{}%", value.into()));
        self.push_compare(field, pattern, Operator::Like, ConditionType::Or)
    }

    pub fn or_in(self, field: &str, values: Vec<impl Into<BindValue>>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in(field, values, false, ConditionType::Or)
    }

    pub fn or_is_null(mut self, field: &str) -> Self {
        self.conditions.push(ConditionItem::Single(
            field.to_string(),
            Operator::IsNull,
            ConditionType::Or,
        ));
        self
    }

    pub fn or_is_not_null(mut self, field: &str) -> Self {
        self.conditions.push(ConditionItem::Single(
            field.to_string(),
            Operator::IsNotNull,
            ConditionType::Or,
        ));
        self
    }

    pub fn or_between(
        self,
        field: &str,
        min: impl Into<BindValue>,
        max: impl Into<BindValue>,
    ) -> Self {
        self.push_between(field, min.into(), max.into(), ConditionType::Or)
    }

    /// OR 条件分组
    pub fn or_group<F>(self, f: F) -> Self
    where
        F: FnOnce(Filter) -> Filter,
    {
        self.push_group(f, ConditionType::Or)
    }
}

/// 列名转换为占位符名：非标识符字符替换为 `_`，数字开头时补 `_`
fn placeholder_base(field: &str) -> String {
    let mut base: String = field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert(0, '_');
    }
    base
}

fn build_conditions_sql(items: &[ConditionItem]) -> String {
    let mut sql = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            match item.condition_type() {
                ConditionType::And => sql.push_str(" AND "),
                ConditionType::Or => sql.push_str(" OR "),
            }
        }
        match item {
            ConditionItem::Single(field, op, _) => sql.push_str(&op.to_sql(field)),
            ConditionItem::Group(group, _) => {
                sql.push('(');
                sql.push_str(&build_conditions_sql(group));
                sql.push(')');
            }
        }
    }
    sql
}

impl Condition for Filter {
    fn render(&self) -> String {
        build_conditions_sql(&self.conditions)
    }

    fn parameters(&self) -> Params {
        self.params.clone()
    }
}
