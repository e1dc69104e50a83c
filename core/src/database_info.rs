//! 数据库信息抽象层
//!
//! 提供统一的接口来访问不同数据库的特性，如占位符、标识符转义、
//! 参数绑定与行解码等。

use crate::db_pool::DbDriver;
use crate::record::Record;
use crate::utils::{value_kind, ValueKind};
use crate::value::BindValue;
use sqlx::query::Query;
use sqlx::{Column, ColumnIndex, Database, Decode, Row, Type, TypeInfo, ValueRef};

/// 数据库信息 trait
///
/// 为不同的数据库类型提供统一的接口，用于获取数据库特定的信息与行为。
///
/// # 实现要求
///
/// 每个数据库类型（`sqlx::MySql`, `sqlx::Postgres`, `sqlx::Sqlite`）
/// 都需要实现此 trait，以提供数据库特定的行为。
pub trait DatabaseInfo: Database {
    /// 获取占位符字符串
    ///
    /// * MySQL/SQLite: `"?"`
    /// * PostgreSQL: `"$1"`, `"$2"`, ... (index + 1)
    fn placeholder(index: usize) -> String;

    /// 转义 SQL 标识符（表名、列名等）
    ///
    /// * MySQL: `` `name` ``
    /// * PostgreSQL/SQLite: `"name"`
    fn escape_identifier(name: &str) -> String;

    /// 获取数据库驱动类型
    fn get_driver() -> DbDriver;

    /// 把一个绑定值追加到查询上
    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: &BindValue,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>>;

    /// 把一行解码为 [`Record`]，按列的 SQL 类型选择解码方式
    fn decode_row(row: &Self::Row) -> Result<Record, sqlx::Error>;

    fn rows_affected(result: &Self::QueryResult) -> u64;

    /// 语句执行后数据库生成的自增主键（PostgreSQL 使用 RETURNING，这里总是 None）
    fn last_insert_id(result: &Self::QueryResult) -> Option<i64>;
}

/// 按列读取一个值，类型不匹配时返回 None 以便尝试下一种类型
fn get<'r, R, T>(row: &'r R, index: usize) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(index).ok()
}

/// 逐列解码，NULL 统一为 `BindValue::Null`，其余交给 `decode`
fn decode_columns<R, F>(row: &R, mut decode: F) -> Result<Record, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    F: FnMut(&R, usize, ValueKind) -> Option<BindValue>,
{
    let mut record = Record::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let type_name = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };
        let value = match type_name {
            None => BindValue::Null,
            Some(type_name) => decode(row, index, value_kind(&type_name)).ok_or_else(|| {
                sqlx::Error::ColumnDecode {
                    index: column.name().to_string(),
                    source: format!("unsupported column type {}", type_name).into(),
                }
            })?,
        };
        record.insert(column.name(), value);
    }
    Ok(record)
}

/// 超出 i64 范围的无符号整数以 DECIMAL 保存
#[cfg(feature = "mysql")]
fn unsigned_value(value: u64) -> BindValue {
    match i64::try_from(value) {
        Ok(i) => BindValue::Int64(i),
        Err(_) => BindValue::Decimal(bigdecimal::BigDecimal::from(value)),
    }
}

/// 取不到具体类型时使用原始值：文本格式转为字符串，二进制格式保留字节
#[cfg(feature = "postgres")]
fn postgres_raw_value(value: sqlx::postgres::PgValueRef<'_>) -> Option<BindValue> {
    let format = value.format();
    let bytes = value.as_bytes().ok()?;
    Some(postgres_fallback(format, bytes))
}

#[cfg(feature = "postgres")]
fn postgres_fallback(format: sqlx::postgres::PgValueFormat, bytes: &[u8]) -> BindValue {
    match format {
        sqlx::postgres::PgValueFormat::Text => match std::str::from_utf8(bytes) {
            Ok(text) => BindValue::String(text.to_string()),
            Err(_) => BindValue::Bytes(bytes.to_vec()),
        },
        sqlx::postgres::PgValueFormat::Binary => BindValue::Bytes(bytes.to_vec()),
    }
}

/// 按 BindValue 变体调用 `query.bind`，`decimal` 分支由各数据库决定绑定类型
macro_rules! bind_by_variant {
    ($query:ident, $value:expr, |$d:ident| $decimal:expr) => {
        match $value {
            BindValue::Null => $query.bind(Option::<String>::None),
            BindValue::Int64(i) => $query.bind(*i),
            BindValue::Float64(f) => $query.bind(*f),
            BindValue::String(s) => $query.bind(s.clone()),
            BindValue::Bool(b) => $query.bind(*b),
            BindValue::Bytes(b) => $query.bind(b.clone()),
            BindValue::Decimal($d) => $query.bind($decimal),
            BindValue::Timestamp(t) => $query.bind(*t),
        }
    };
}

// ========== MySQL 实现 ==========

#[cfg(feature = "mysql")]
impl DatabaseInfo for sqlx::MySql {
    fn placeholder(_index: usize) -> String {
        // MySQL 使用 ? 作为占位符，不依赖索引
        "?".to_string()
    }

    fn escape_identifier(name: &str) -> String {
        // MySQL 使用反引号转义标识符
        format!("`{}`", name.replace('`', "``"))
    }

    fn get_driver() -> DbDriver {
        DbDriver::MySql
    }

    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: &BindValue,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>> {
        bind_by_variant!(query, value, |d| d.clone())
    }

    fn decode_row(row: &Self::Row) -> Result<Record, sqlx::Error> {
        use bigdecimal::BigDecimal;
        use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
        use sqlx::types::JsonValue;

        decode_columns(row, |row, i, kind| match kind {
            ValueKind::Int => get::<_, i64>(row, i)
                .map(BindValue::from)
                .or_else(|| get::<_, i32>(row, i).map(BindValue::from))
                .or_else(|| get::<_, i16>(row, i).map(BindValue::from))
                .or_else(|| get::<_, i8>(row, i).map(BindValue::from)),
            ValueKind::UnsignedInt => get::<_, u64>(row, i).map(unsigned_value),
            ValueKind::Float => get::<_, f64>(row, i)
                .map(BindValue::from)
                .or_else(|| get::<_, f32>(row, i).map(BindValue::from)),
            // TINYINT(1) 以 BOOLEAN 报告
            ValueKind::Bool => get::<_, bool>(row, i)
                .map(BindValue::from)
                .or_else(|| get::<_, i64>(row, i).map(BindValue::from)),
            ValueKind::Decimal => get::<_, BigDecimal>(row, i).map(BindValue::from),
            ValueKind::Timestamp => get::<_, NaiveDateTime>(row, i)
                .map(BindValue::from)
                .or_else(|| get::<_, DateTime<Utc>>(row, i).map(BindValue::from)),
            ValueKind::Date => get::<_, NaiveDate>(row, i).map(|d| BindValue::String(d.to_string())),
            ValueKind::Time => get::<_, NaiveTime>(row, i).map(|t| BindValue::String(t.to_string())),
            ValueKind::Bytes => get::<_, Vec<u8>>(row, i).map(BindValue::from),
            ValueKind::Json => get::<_, JsonValue>(row, i)
                .map(|v| BindValue::String(v.to_string()))
                .or_else(|| get::<_, String>(row, i).map(BindValue::from)),
            ValueKind::Text | ValueKind::Uuid | ValueKind::Other => get::<_, String>(row, i)
                .map(BindValue::from)
                .or_else(|| get::<_, Vec<u8>>(row, i).map(BindValue::from)),
        })
    }

    fn rows_affected(result: &Self::QueryResult) -> u64 {
        result.rows_affected()
    }

    fn last_insert_id(result: &Self::QueryResult) -> Option<i64> {
        // 0 表示本条语句没有生成自增值
        match result.last_insert_id() {
            0 => None,
            id => i64::try_from(id).ok(),
        }
    }
}

// ========== PostgreSQL 实现 ==========

#[cfg(feature = "postgres")]
impl DatabaseInfo for sqlx::Postgres {
    fn placeholder(index: usize) -> String {
        // PostgreSQL 使用 $1, $2, ... 作为占位符
        format!("${}", index + 1)
    }

    fn escape_identifier(name: &str) -> String {
        // PostgreSQL 使用双引号转义标识符
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn get_driver() -> DbDriver {
        DbDriver::Postgres
    }

    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: &BindValue,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>> {
        bind_by_variant!(query, value, |d| d.clone())
    }

    fn decode_row(row: &Self::Row) -> Result<Record, sqlx::Error> {
        use bigdecimal::BigDecimal;
        use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
        use sqlx::types::{JsonValue, Uuid};

        decode_columns(row, |row, i, kind| {
            let decoded = match kind {
                // PostgreSQL 的整数解码要求宽度一致，依次尝试
                ValueKind::Int | ValueKind::UnsignedInt => get::<_, i64>(row, i)
                    .map(BindValue::from)
                    .or_else(|| get::<_, i32>(row, i).map(BindValue::from))
                    .or_else(|| get::<_, i16>(row, i).map(BindValue::from)),
                ValueKind::Float => get::<_, f64>(row, i)
                    .map(BindValue::from)
                    .or_else(|| get::<_, f32>(row, i).map(BindValue::from)),
                ValueKind::Bool => get::<_, bool>(row, i).map(BindValue::from),
                ValueKind::Decimal => get::<_, BigDecimal>(row, i).map(BindValue::from),
                ValueKind::Timestamp => get::<_, NaiveDateTime>(row, i)
                    .map(BindValue::from)
                    .or_else(|| get::<_, DateTime<Utc>>(row, i).map(BindValue::from)),
                ValueKind::Date => get::<_, NaiveDate>(row, i).map(|d| BindValue::String(d.to_string())),
                ValueKind::Time => get::<_, NaiveTime>(row, i).map(|t| BindValue::String(t.to_string())),
                ValueKind::Bytes => get::<_, Vec<u8>>(row, i).map(BindValue::from),
                ValueKind::Uuid => get::<_, Uuid>(row, i).map(|u| BindValue::String(u.to_string())),
                ValueKind::Json => get::<_, JsonValue>(row, i).map(|v| BindValue::String(v.to_string())),
                ValueKind::Text | ValueKind::Other => get::<_, String>(row, i).map(BindValue::from),
            };
            // INET、数组等没有对应变体的类型按原始值保留
            decoded.or_else(|| row.try_get_raw(i).ok().and_then(postgres_raw_value))
        })
    }

    fn rows_affected(result: &Self::QueryResult) -> u64 {
        result.rows_affected()
    }

    fn last_insert_id(_result: &Self::QueryResult) -> Option<i64> {
        None
    }
}

// ========== SQLite 实现 ==========

#[cfg(feature = "sqlite")]
impl DatabaseInfo for sqlx::Sqlite {
    fn placeholder(_index: usize) -> String {
        // SQLite 使用 ? 作为占位符，不依赖索引
        "?".to_string()
    }

    fn escape_identifier(name: &str) -> String {
        // SQLite 使用双引号转义标识符
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn get_driver() -> DbDriver {
        DbDriver::Sqlite
    }

    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: &BindValue,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>> {
        // SQLite 没有 DECIMAL 存储类型，按文本保存
        bind_by_variant!(query, value, |d| d.to_string())
    }

    fn decode_row(row: &Self::Row) -> Result<Record, sqlx::Error> {
        // SQLite 的类型名取自值本身的存储类型：INTEGER / REAL / TEXT / BLOB
        decode_columns(row, |row, i, kind| match kind {
            ValueKind::Int | ValueKind::UnsignedInt | ValueKind::Bool => {
                get::<_, i64>(row, i).map(BindValue::from)
            }
            ValueKind::Float => get::<_, f64>(row, i).map(BindValue::from),
            ValueKind::Bytes => get::<_, Vec<u8>>(row, i).map(BindValue::from),
            _ => get::<_, String>(row, i)
                .map(BindValue::from)
                .or_else(|| get::<_, Vec<u8>>(row, i).map(BindValue::from)),
        })
    }

    fn rows_affected(result: &Self::QueryResult) -> u64 {
        result.rows_affected()
    }

    fn last_insert_id(result: &Self::QueryResult) -> Option<i64> {
        Some(result.last_insert_rowid())
    }
}
