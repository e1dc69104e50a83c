#[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
use sqlx::Pool;
use std::sync::Arc;
use thiserror::Error;

use crate::crud;
use crate::executor::DbExecutor;
use crate::record::{Params, Record};
use crate::value::BindValue;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDriver {
    MySql,
    Postgres,
    Sqlite,
}

impl DbDriver {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Ok(DbDriver::MySql)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DbDriver::Postgres)
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            Ok(DbDriver::Sqlite)
        } else {
            Err(DbPoolError::UnsupportedDatabase(url.to_string()))
        }
    }

    pub fn placeholder(&self, index: usize) -> String {
        match self {
            DbDriver::MySql | DbDriver::Sqlite => "?".to_string(),
            DbDriver::Postgres => format!("${}", index + 1),
        }
    }

    /// 把 `:name` 命名占位符改写为驱动的位置占位符
    ///
    /// 返回改写后的 SQL 与按出现顺序排列的绑定值。
    /// 引号内的文本和 PostgreSQL 的 `::type` 类型转换保持原样；
    /// 同一个名字出现多次时会重复绑定。
    pub fn bind_named(&self, sql: &str, params: &Params) -> Result<(String, Vec<BindValue>)> {
        let mut out = String::with_capacity(sql.len());
        let mut binds = Vec::new();
        let mut quote: Option<char> = None;
        let mut chars = sql.chars().peekable();

        while let Some(ch) = chars.next() {
            if let Some(q) = quote {
                out.push(ch);
                if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                ':' if chars.peek() == Some(&':') => {
                    out.push_str("::");
                    chars.next();
                }
                ':' if chars
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_') =>
                {
                    let mut name = String::from(":");
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let value = params
                        .get(&name)
                        .ok_or_else(|| DbPoolError::UnboundParameter(name.clone()))?;
                    out.push_str(&self.placeholder(binds.len()));
                    binds.push(value.clone());
                }
                _ => out.push(ch),
            }
        }

        Ok((out, binds))
    }
}

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("Unsupported database URL: {0}")]
    UnsupportedDatabase(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("No connection pool available for driver")]
    NoPoolAvailable,
    #[error("No value bound for placeholder {0}")]
    UnboundParameter(String),
    #[error("Table `{0}` does not exist or has no columns")]
    UnknownTable(String),
    #[error("Nothing to insert into `{0}`: no writable columns")]
    EmptyRecord(String),
    #[error("Transaction already committed or rolled back")]
    TransactionConsumed,
}

pub type Result<T> = std::result::Result<T, DbPoolError>;

#[derive(Debug, Clone)]
pub struct DbPool {
    driver: DbDriver,
    #[cfg(feature = "mysql")]
    mysql: Option<Arc<Pool<sqlx::MySql>>>,
    #[cfg(feature = "postgres")]
    pg: Option<Arc<Pool<sqlx::Postgres>>>,
    #[cfg(feature = "sqlite")]
    sqlite: Option<Arc<Pool<sqlx::Sqlite>>>,
}

/// 按驱动取出连接池并执行 `$body`，`$db` 绑定为对应的 sqlx 数据库类型
macro_rules! with_pool {
    ($self:expr, $pool:ident, $db:ident => $body:expr) => {
        match $self.driver {
            #[cfg(feature = "mysql")]
            DbDriver::MySql => {
                type $db = sqlx::MySql;
                let $pool = $self.mysql.as_deref().ok_or(DbPoolError::NoPoolAvailable)?;
                $body
            }
            #[cfg(feature = "postgres")]
            DbDriver::Postgres => {
                type $db = sqlx::Postgres;
                let $pool = $self.pg.as_deref().ok_or(DbPoolError::NoPoolAvailable)?;
                $body
            }
            #[cfg(feature = "sqlite")]
            DbDriver::Sqlite => {
                type $db = sqlx::Sqlite;
                let $pool = $self.sqlite.as_deref().ok_or(DbPoolError::NoPoolAvailable)?;
                $body
            }
            #[allow(unreachable_patterns)]
            _ => Err(DbPoolError::NoPoolAvailable),
        }
    };
}

impl DbPool {
    /// 从数据库 URL 连接并创建 DbPool
    pub async fn connect(url: &str) -> Result<Self> {
        let driver = DbDriver::from_url(url)?;
        log::info!("event=pool_connect module=db status=start driver={:?}", driver);

        let pool = match driver {
            #[cfg(feature = "mysql")]
            DbDriver::MySql => Pool::<sqlx::MySql>::connect(url)
                .await
                .map(|pool| Self::from_mysql_pool(Arc::new(pool))),
            #[cfg(feature = "postgres")]
            DbDriver::Postgres => Pool::<sqlx::Postgres>::connect(url)
                .await
                .map(|pool| Self::from_postgres_pool(Arc::new(pool))),
            #[cfg(feature = "sqlite")]
            DbDriver::Sqlite => Pool::<sqlx::Sqlite>::connect(url)
                .await
                .map(|pool| Self::from_sqlite_pool(Arc::new(pool))),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(DbPoolError::UnsupportedDatabase(format!(
                    "driver {:?} is not enabled in this build",
                    driver
                )))
            }
        };

        match pool {
            Ok(pool) => {
                log::info!("event=pool_connect module=db status=ok driver={:?}", driver);
                Ok(pool)
            }
            Err(err) => {
                log::error!(
                    "event=pool_connect module=db status=error driver={:?} error={}",
                    driver,
                    err
                );
                Err(err.into())
            }
        }
    }

    /// 从 MySQL Pool 创建 DbPool
    #[cfg(feature = "mysql")]
    pub fn from_mysql_pool(pool: Arc<Pool<sqlx::MySql>>) -> Self {
        Self {
            driver: DbDriver::MySql,
            mysql: Some(pool),
            #[cfg(feature = "postgres")]
            pg: None,
            #[cfg(feature = "sqlite")]
            sqlite: None,
        }
    }

    /// 从 PostgreSQL Pool 创建 DbPool
    #[cfg(feature = "postgres")]
    pub fn from_postgres_pool(pool: Arc<Pool<sqlx::Postgres>>) -> Self {
        Self {
            driver: DbDriver::Postgres,
            #[cfg(feature = "mysql")]
            mysql: None,
            pg: Some(pool),
            #[cfg(feature = "sqlite")]
            sqlite: None,
        }
    }

    /// 从 SQLite Pool 创建 DbPool
    #[cfg(feature = "sqlite")]
    pub fn from_sqlite_pool(pool: Arc<Pool<sqlx::Sqlite>>) -> Self {
        Self {
            driver: DbDriver::Sqlite,
            #[cfg(feature = "mysql")]
            mysql: None,
            #[cfg(feature = "postgres")]
            pg: None,
            sqlite: Some(pool),
        }
    }

    pub fn driver(&self) -> DbDriver {
        self.driver
    }

    #[cfg(feature = "mysql")]
    pub fn mysql_pool(&self) -> Option<&Pool<sqlx::MySql>> {
        self.mysql.as_deref()
    }

    #[cfg(feature = "postgres")]
    pub fn pg_pool(&self) -> Option<&Pool<sqlx::Postgres>> {
        self.pg.as_deref()
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlite_pool(&self) -> Option<&Pool<sqlx::Sqlite>> {
        self.sqlite.as_deref()
    }
}

#[async_trait]
impl DbExecutor for DbPool {
    type Error = DbPoolError;

    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Record>> {
        with_pool!(self, pool, Db => crud::fetch_records::<Db, _>(pool, sql, params).await)
    }

    async fn execute(&self, sql: &str, params: &Params) -> Result<u64> {
        with_pool!(self, pool, Db => crud::execute_statement::<Db, _>(pool, sql, params).await)
    }

    async fn insert(&self, table: &str, record: &Record, upsert: bool) -> Result<Option<BindValue>> {
        with_pool!(self, pool, Db => {
            let info = crud::table_info::<Db, _>(pool, table).await?;
            crud::insert_record::<Db, _>(pool, &info, record, upsert).await
        })
    }

    async fn reduce_to_insertable_columns(&self, record: &Record, table: &str) -> Result<Record> {
        with_pool!(self, pool, Db => {
            let info = crud::table_info::<Db, _>(pool, table).await?;
            Ok(info.reduce(record))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, BindValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // ========== 驱动识别测试 ==========
    #[test]
    fn test_from_url() {
        assert_eq!(DbDriver::from_url("mysql://u@h/db").unwrap(), DbDriver::MySql);
        assert_eq!(
            DbDriver::from_url("postgresql://u@h/db").unwrap(),
            DbDriver::Postgres
        );
        assert_eq!(DbDriver::from_url("sqlite::memory:").unwrap(), DbDriver::Sqlite);
        assert!(matches!(
            DbDriver::from_url("oracle://h"),
            Err(DbPoolError::UnsupportedDatabase(_))
        ));
    }

    // ========== 命名占位符改写测试 ==========
    #[test]
    fn test_bind_named_mysql() {
        let p = params(&[(":b", BindValue::from(2)), (":a", BindValue::from(1))]);
        let (sql, binds) = DbDriver::MySql
            .bind_named("DELETE FROM t WHERE a = :a AND b = :b", &p)
            .unwrap();
        assert_eq!(sql, "DELETE FROM t WHERE a = ? AND b = ?");
        assert_eq!(binds, vec![BindValue::from(1), BindValue::from(2)]);
    }

    #[test]
    fn test_bind_named_postgres_numbering() {
        let p = params(&[(":id", BindValue::from(7))]);
        let (sql, binds) = DbDriver::Postgres
            .bind_named("SELECT * FROM t WHERE id = :id OR parent = :id", &p)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id = $1 OR parent = $2");
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn test_bind_named_skips_quotes_and_casts() {
        let p = params(&[(":t", BindValue::from("users"))]);
        let (sql, binds) = DbDriver::Postgres
            .bind_named(
                "SELECT name::text, ':nope', \"c:x\" FROM x WHERE a = :t AND b LIKE 'a:%'",
                &p,
            )
            .unwrap();
        assert_eq!(
            sql,
            "SELECT name::text, ':nope', \"c:x\" FROM x WHERE a = $1 AND b LIKE 'a:%'"
        );
        assert_eq!(binds, vec![BindValue::from("users")]);
    }

    #[test]
    fn test_bind_named_keeps_lone_colon() {
        let (sql, binds) = DbDriver::Sqlite
            .bind_named("SELECT ': ' || x, 1 : 2", &Params::new())
            .unwrap();
        assert_eq!(sql, "SELECT ': ' || x, 1 : 2");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_bind_named_missing_value() {
        let err = DbDriver::Sqlite
            .bind_named("SELECT * FROM t WHERE id = :id", &Params::new())
            .unwrap_err();
        assert!(matches!(err, DbPoolError::UnboundParameter(name) if name == ":id"));
    }
}
