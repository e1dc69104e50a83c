//! 表结构读取
//!
//! 三种数据库的元数据查询都返回同样的四列：
//! `column_name`、`key_position`（0 表示非主键）、`is_auto`、`is_generated`。

use crate::db_pool::{DbDriver, DbPoolError};
use crate::record::Record;
use crate::value::BindValue;

const MYSQL_TABLE_INFO: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS column_name, \
    CAST(IF(COLUMN_KEY = 'PRI', 1, 0) AS SIGNED) AS key_position, \
    CAST(IF(EXTRA LIKE '%auto_increment%', 1, 0) AS SIGNED) AS is_auto, \
    CAST(IF(EXTRA LIKE '%VIRTUAL GENERATED%' OR EXTRA LIKE '%STORED GENERATED%', 1, 0) AS SIGNED) AS is_generated \
    FROM INFORMATION_SCHEMA.COLUMNS \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = :table \
    ORDER BY ORDINAL_POSITION";

const POSTGRES_TABLE_INFO: &str = "SELECT c.column_name::text AS column_name, \
    COALESCE(k.ordinal_position, 0)::int8 AS key_position, \
    (CASE WHEN c.column_default LIKE 'nextval(%' OR c.is_identity = 'YES' THEN 1 ELSE 0 END)::int8 AS is_auto, \
    (CASE WHEN c.is_generated = 'ALWAYS' THEN 1 ELSE 0 END)::int8 AS is_generated \
    FROM information_schema.columns c \
    LEFT JOIN ( \
        SELECT kcu.column_name, kcu.ordinal_position \
        FROM information_schema.table_constraints tc \
        JOIN information_schema.key_column_usage kcu \
          ON tc.constraint_name = kcu.constraint_name \
         AND tc.table_schema = kcu.table_schema \
         AND tc.table_name = kcu.table_name \
        WHERE tc.constraint_type = 'PRIMARY KEY' \
          AND tc.table_schema = current_schema() \
          AND tc.table_name = :table \
    ) k ON k.column_name = c.column_name \
    WHERE c.table_schema = current_schema() AND c.table_name = :table \
    ORDER BY c.ordinal_position";

// 单列 INTEGER 主键是 rowid 别名，插入时可由数据库生成
const SQLITE_TABLE_INFO: &str = "SELECT name AS column_name, \
    pk AS key_position, \
    CASE WHEN pk = 1 AND upper(type) = 'INTEGER' \
         AND (SELECT count(*) FROM pragma_table_info(:table) WHERE pk > 0) = 1 \
         THEN 1 ELSE 0 END AS is_auto, \
    CASE WHEN hidden IN (2, 3) THEN 1 ELSE 0 END AS is_generated \
    FROM pragma_table_xinfo(:table) \
    ORDER BY cid";

/// 读取表结构的 SQL，参数为 `:table`
pub(crate) fn table_info_sql(driver: DbDriver) -> &'static str {
    match driver {
        DbDriver::MySql => MYSQL_TABLE_INFO,
        DbDriver::Postgres => POSTGRES_TABLE_INFO,
        DbDriver::Sqlite => SQLITE_TABLE_INFO,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// 在主键中的位置，从 1 开始；0 表示不是主键列
    pub key_position: u32,
    pub auto_increment: bool,
    /// 计算列，不能写入
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// 从元数据查询结果构建；没有任何列时视为表不存在
    pub fn from_rows(table: &str, rows: &[Record]) -> Result<Self, DbPoolError> {
        let columns: Vec<ColumnInfo> = rows
            .iter()
            .filter_map(|row| {
                let name = text(row.get("column_name")?)?;
                Some(ColumnInfo {
                    name,
                    key_position: int(row.get("key_position")).max(0) as u32,
                    auto_increment: int(row.get("is_auto")) != 0,
                    generated: int(row.get("is_generated")) != 0,
                })
            })
            .collect();

        if columns.is_empty() {
            return Err(DbPoolError::UnknownTable(table.to_string()));
        }
        Ok(Self {
            name: table.to_string(),
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 主键列，按主键内顺序排列
    pub fn primary_key(&self) -> Vec<&str> {
        let mut keys: Vec<&ColumnInfo> = self.columns.iter().filter(|c| c.key_position > 0).collect();
        keys.sort_by_key(|c| c.key_position);
        keys.into_iter().map(|c| c.name.as_str()).collect()
    }

    /// 单列自增主键的列名；复合主键或无自增列时为 None
    pub fn auto_increment_key(&self) -> Option<&str> {
        match self.primary_key().as_slice() {
            [only] => self
                .column(only)
                .filter(|c| c.auto_increment)
                .map(|c| c.name.as_str()),
            _ => None,
        }
    }

    /// 只保留表中存在且不是计算列的列，保持记录原有顺序
    pub fn reduce(&self, record: &Record) -> Record {
        record
            .iter()
            .filter(|(column, _)| self.column(column).is_some_and(|c| !c.generated))
            .map(|(column, value)| (column, value.clone()))
            .collect()
    }
}

fn text(value: &BindValue) -> Option<String> {
    match value {
        BindValue::String(s) => Some(s.clone()),
        BindValue::Bytes(b) => String::from_utf8(b.clone()).ok(),
        _ => None,
    }
}

fn int(value: Option<&BindValue>) -> i64 {
    match value {
        Some(BindValue::Int64(i)) => *i,
        Some(BindValue::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}
