//! 基于 sqlx 的语句执行（泛型版本）
//!
//! 这些函数是 `DbPool` 与 `DbTransaction` 实现 `DbExecutor` 的共用部分，
//! 支持所有实现了 `DatabaseInfo` 的数据库类型。执行器可以是连接池或事务连接。

use crate::database_info::DatabaseInfo;
use crate::db_pool::{DbDriver, DbPoolError, Result};
use crate::record::{Params, Record};
use crate::schema::{table_info_sql, TableInfo};
use crate::value::BindValue;
use sqlx::Database;

/// 改写命名占位符并依次绑定参数
fn prepare<'q, DB>(
    sql: &'q str,
    binds: &[BindValue],
) -> sqlx::query::Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database + DatabaseInfo,
{
    let mut query = sqlx::query::<DB>(sql);
    for value in binds {
        query = DB::bind_value(query, value);
    }
    query
}

/// 执行查询并把每一行解码为 [`Record`]
///
/// # 示例
///
/// ```rust,ignore
/// let rows = crud::fetch_records::<sqlx::Sqlite, _>(pool, "SELECT * FROM t WHERE id = :id", &params).await?;
/// ```
pub async fn fetch_records<'e, 'c: 'e, DB, E>(
    executor: E,
    sql: &str,
    params: &Params,
) -> Result<Vec<Record>>
where
    DB: Database + DatabaseInfo,
    for<'a> DB::Arguments<'a>: sqlx::IntoArguments<'a, DB>,
    E: sqlx::Executor<'c, Database = DB> + Send,
{
    let (sql, binds) = DB::get_driver().bind_named(sql, params)?;
    log::debug!("event=sql_query module=db sql={} binds={}", sql, binds.len());
    let rows = prepare::<DB>(&sql, &binds).fetch_all(executor).await?;
    rows.iter()
        .map(|row| DB::decode_row(row).map_err(DbPoolError::from))
        .collect()
}

/// 执行不返回行的语句，返回受影响行数
pub async fn execute_statement<'e, 'c: 'e, DB, E>(
    executor: E,
    sql: &str,
    params: &Params,
) -> Result<u64>
where
    DB: Database + DatabaseInfo,
    for<'a> DB::Arguments<'a>: sqlx::IntoArguments<'a, DB>,
    E: sqlx::Executor<'c, Database = DB> + Send,
{
    let (sql, binds) = DB::get_driver().bind_named(sql, params)?;
    log::debug!("event=sql_execute module=db sql={} binds={}", sql, binds.len());
    let result = prepare::<DB>(&sql, &binds).execute(executor).await?;
    Ok(DB::rows_affected(&result))
}

/// 读取表结构（列、主键、自增列、计算列）
pub async fn table_info<'e, 'c: 'e, DB, E>(executor: E, table: &str) -> Result<TableInfo>
where
    DB: Database + DatabaseInfo,
    for<'a> DB::Arguments<'a>: sqlx::IntoArguments<'a, DB>,
    E: sqlx::Executor<'c, Database = DB> + Send,
{
    let mut params = Params::new();
    params.insert(":table".to_string(), BindValue::from(table));
    let rows = fetch_records::<DB, E>(executor, table_info_sql(DB::get_driver()), &params).await?;
    TableInfo::from_rows(table, &rows)
}

/// 生成的 INSERT 语句
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InsertStatement {
    pub sql: String,
    pub binds: Vec<BindValue>,
    /// 需要取回数据库生成的主键
    pub returns_key: Option<String>,
}

/// 生成 INSERT 语句（可选 upsert 子句）
///
/// - `NULL` 直接写成字面量，不占用绑定参数
/// - 单列自增主键缺失或为 `NULL` 时不写入该列，并标记需要取回生成的主键
/// - upsert 时：MySQL 使用 `ON DUPLICATE KEY UPDATE`，
///   PostgreSQL / SQLite 使用 `ON CONFLICT (pk) DO UPDATE SET`，只有主键列时 `DO NOTHING`
pub(crate) fn build_insert<DB>(
    info: &TableInfo,
    record: &Record,
    upsert: bool,
) -> Result<InsertStatement>
where
    DB: Database + DatabaseInfo,
{
    let auto_key = info.auto_increment_key();
    let mut record = record.clone();
    let returns_key = match auto_key {
        Some(key) if record.get(key).map_or(true, BindValue::is_null) => {
            record.remove(key);
            Some(key.to_string())
        }
        _ => None,
    };

    if record.is_empty() {
        return Err(DbPoolError::EmptyRecord(info.name.clone()));
    }

    let mut columns = Vec::with_capacity(record.len());
    let mut values = Vec::with_capacity(record.len());
    let mut binds = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        columns.push(DB::escape_identifier(column));
        if value.is_null() {
            values.push("NULL".to_string());
        } else {
            values.push(DB::placeholder(binds.len()));
            binds.push(value.clone());
        }
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        DB::escape_identifier(&info.name),
        columns.join(", "),
        values.join(", ")
    );

    let primary_key = info.primary_key();
    if upsert && !primary_key.is_empty() {
        let updates: Vec<String> = record
            .columns()
            .filter(|c| !primary_key.contains(c))
            .map(DB::escape_identifier)
            .collect();
        match DB::get_driver() {
            DbDriver::MySql => {
                let assignments = if updates.is_empty() {
                    // 没有可更新的列时用无副作用的赋值代替忽略
                    let key = DB::escape_identifier(primary_key[0]);
                    vec![format!("{} = {}", key, key)]
                } else {
                    updates
                        .iter()
                        .map(|c| format!("{} = VALUES({})", c, c))
                        .collect()
                };
                sql.push_str(" ON DUPLICATE KEY UPDATE ");
                sql.push_str(&assignments.join(", "));
            }
            DbDriver::Postgres | DbDriver::Sqlite => {
                let conflict: Vec<String> = primary_key
                    .iter()
                    .map(|c| DB::escape_identifier(c))
                    .collect();
                sql.push_str(&format!(" ON CONFLICT ({})", conflict.join(", ")));
                if updates.is_empty() {
                    sql.push_str(" DO NOTHING");
                } else {
                    let assignments: Vec<String> = updates
                        .iter()
                        .map(|c| format!("{} = excluded.{}", c, c))
                        .collect();
                    sql.push_str(" DO UPDATE SET ");
                    sql.push_str(&assignments.join(", "));
                }
            }
        }
    }

    if let (Some(key), DbDriver::Postgres) = (&returns_key, DB::get_driver()) {
        sql.push_str(&format!(" RETURNING {}", DB::escape_identifier(key)));
    }

    Ok(InsertStatement {
        sql,
        binds,
        returns_key,
    })
}

/// 插入一行，返回数据库生成的主键（如果有）
pub async fn insert_record<'e, 'c: 'e, DB, E>(
    executor: E,
    info: &TableInfo,
    record: &Record,
    upsert: bool,
) -> Result<Option<BindValue>>
where
    DB: Database + DatabaseInfo,
    for<'a> DB::Arguments<'a>: sqlx::IntoArguments<'a, DB>,
    E: sqlx::Executor<'c, Database = DB> + Send,
{
    let statement = build_insert::<DB>(info, record, upsert)?;
    log::debug!(
        "event=sql_insert module=db table={} upsert={} sql={}",
        info.name,
        upsert,
        statement.sql
    );
    let query = prepare::<DB>(&statement.sql, &statement.binds);

    if statement.returns_key.is_none() {
        query.execute(executor).await?;
        return Ok(None);
    }

    match DB::get_driver() {
        DbDriver::Postgres => {
            // ON CONFLICT DO NOTHING 命中时不返回行
            let row = query.fetch_optional(executor).await?;
            match row {
                Some(row) => {
                    let returned = DB::decode_row(&row)?;
                    Ok(returned.into_iter().next().map(|(_, value)| value))
                }
                None => Ok(None),
            }
        }
        DbDriver::MySql | DbDriver::Sqlite => {
            let result = query.execute(executor).await?;
            Ok(DB::last_insert_id(&result).map(BindValue::Int64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::schema::ColumnInfo;

    fn column(name: &str, key_position: u32, auto_increment: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            key_position,
            auto_increment,
            generated: false,
        }
    }

    fn users() -> TableInfo {
        TableInfo {
            name: "users".to_string(),
            columns: vec![column("id", 1, true), column("name", 0, false)],
        }
    }

    fn memberships() -> TableInfo {
        TableInfo {
            name: "memberships".to_string(),
            columns: vec![
                column("org_id", 1, false),
                column("user_id", 2, false),
                column("role", 0, false),
            ],
        }
    }

    // ========== INSERT 测试 ==========
    #[cfg(feature = "sqlite")]
    #[test]
    fn test_insert_without_key_returns_generated() {
        let stmt = build_insert::<sqlx::Sqlite>(&users(), &record! { "name" => "a" }, false).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"users\" (\"name\") VALUES (?)");
        assert_eq!(stmt.returns_key.as_deref(), Some("id"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_insert_null_key_is_dropped() {
        let record = record! { "id" => BindValue::Null, "name" => "a" };
        let stmt = build_insert::<sqlx::Sqlite>(&users(), &record, false).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"users\" (\"name\") VALUES (?)");
        assert_eq!(stmt.binds, vec![BindValue::from("a")]);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_insert_with_explicit_key() {
        let record = record! { "id" => 5, "name" => BindValue::Null };
        let stmt = build_insert::<sqlx::Sqlite>(&users(), &record, false).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"users\" (\"id\", \"name\") VALUES (?, NULL)");
        assert_eq!(stmt.binds, vec![BindValue::from(5)]);
        assert!(stmt.returns_key.is_none());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_insert_empty_record() {
        assert!(matches!(
            build_insert::<sqlx::Sqlite>(&users(), &Record::new(), false),
            Err(DbPoolError::EmptyRecord(t)) if t == "users"
        ));
    }

    // ========== UPSERT 测试 ==========
    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_upsert_composite() {
        let record = record! { "org_id" => 1, "user_id" => 2, "role" => "admin" };
        let stmt = build_insert::<sqlx::Sqlite>(&memberships(), &record, true).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"memberships\" (\"org_id\", \"user_id\", \"role\") VALUES (?, ?, ?) \
             ON CONFLICT (\"org_id\", \"user_id\") DO UPDATE SET \"role\" = excluded.\"role\""
        );
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_upsert_only_key_columns() {
        let record = record! { "org_id" => 1, "user_id" => 2 };
        let stmt = build_insert::<sqlx::Sqlite>(&memberships(), &record, true).unwrap();
        assert!(stmt.sql.ends_with("ON CONFLICT (\"org_id\", \"user_id\") DO NOTHING"));
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn test_mysql_upsert() {
        let record = record! { "id" => 3, "name" => "b" };
        let stmt = build_insert::<sqlx::MySql>(&users(), &record, true).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
        );
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn test_mysql_upsert_only_key_columns() {
        let record = record! { "org_id" => 1, "user_id" => 2 };
        let stmt = build_insert::<sqlx::MySql>(&memberships(), &record, true).unwrap();
        assert!(stmt.sql.ends_with("ON DUPLICATE KEY UPDATE `org_id` = `org_id`"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_postgres_insert_returning() {
        let stmt = build_insert::<sqlx::Postgres>(&users(), &record! { "name" => "a" }, true).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"name\") VALUES ($1) ON CONFLICT (\"id\") DO UPDATE SET \"name\" = excluded.\"name\" RETURNING \"id\""
        );
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_postgres_placeholders_skip_nulls() {
        let record = record! { "org_id" => 1, "user_id" => BindValue::Null, "role" => "x" };
        let stmt = build_insert::<sqlx::Postgres>(&memberships(), &record, false).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"memberships\" (\"org_id\", \"user_id\", \"role\") VALUES ($1, NULL, $2)"
        );
    }
}
