//! 等值条件与命名参数渲染

use crate::record::{Params, Record};

/// 列名对应的命名占位符：`:` + 列名
pub(crate) fn placeholder(column: &str) -> String {
    format!(":{}", column)
}

/// 按记录的列顺序渲染 `col1 = :col1 AND col2 = :col2 ...`
///
/// 空记录返回空字符串，由调用方决定是否省略 WHERE。
/// 列名视为可信的静态标识符，不做转义。
pub(crate) fn render_equality(conditions: &Record) -> String {
    conditions
        .columns()
        .map(|column| format!("{} = {}", column, placeholder(column)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// 同一条件对应的参数映射：占位符名 → 值
pub(crate) fn to_parameters(conditions: &Record) -> Params {
    conditions
        .iter()
        .map(|(column, value)| (placeholder(column), value.clone()))
        .collect()
}
