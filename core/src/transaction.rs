use crate::crud;
use crate::db_pool::{DbDriver, DbPool, DbPoolError, Result};
use crate::executor::DbExecutor;
use crate::record::{Params, Record};
use crate::value::BindValue;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// 已开始的 sqlx 事务
#[derive(Debug)]
enum Transaction {
    #[cfg(feature = "mysql")]
    MySql(sqlx::Transaction<'static, sqlx::MySql>),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::Transaction<'static, sqlx::Sqlite>),
}

/// 事务范围内的执行器
///
/// 通过 `DbPool::begin` 创建。所有语句都在同一个事务连接上顺序执行，
/// 调用 `commit` 或 `rollback` 之后再使用会返回 `TransactionConsumed`。
/// 未提交就被丢弃时，sqlx 会自动回滚。
///
/// ```rust,ignore
/// let tx = pool.begin().await?;
/// engine.save(&tx, &record).await?;
/// engine.delete(&tx, 1).await?;
/// tx.commit().await?;
/// ```
#[derive(Debug)]
pub struct DbTransaction {
    driver: DbDriver,
    inner: Mutex<Option<Transaction>>,
}

/// 锁住事务连接并执行 `$body`，`$db` 绑定为对应的 sqlx 数据库类型
macro_rules! with_transaction {
    ($self:expr, $conn:ident, $db:ident => $body:expr) => {{
        let mut guard = $self.inner.lock().await;
        match guard.as_mut().ok_or(DbPoolError::TransactionConsumed)? {
            #[cfg(feature = "mysql")]
            Transaction::MySql(tx) => {
                type $db = sqlx::MySql;
                let $conn = &mut **tx;
                $body
            }
            #[cfg(feature = "postgres")]
            Transaction::Postgres(tx) => {
                type $db = sqlx::Postgres;
                let $conn = &mut **tx;
                $body
            }
            #[cfg(feature = "sqlite")]
            Transaction::Sqlite(tx) => {
                type $db = sqlx::Sqlite;
                let $conn = &mut **tx;
                $body
            }
        }
    }};
}

impl DbTransaction {
    pub fn driver(&self) -> DbDriver {
        self.driver
    }

    /// 提交事务
    pub async fn commit(&self) -> Result<()> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(DbPoolError::TransactionConsumed)?;
        match tx {
            #[cfg(feature = "mysql")]
            Transaction::MySql(tx) => tx.commit().await?,
            #[cfg(feature = "postgres")]
            Transaction::Postgres(tx) => tx.commit().await?,
            #[cfg(feature = "sqlite")]
            Transaction::Sqlite(tx) => tx.commit().await?,
        }
        log::debug!("event=tx_commit module=db status=ok driver={:?}", self.driver);
        Ok(())
    }

    /// 回滚事务
    pub async fn rollback(&self) -> Result<()> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(DbPoolError::TransactionConsumed)?;
        match tx {
            #[cfg(feature = "mysql")]
            Transaction::MySql(tx) => tx.rollback().await?,
            #[cfg(feature = "postgres")]
            Transaction::Postgres(tx) => tx.rollback().await?,
            #[cfg(feature = "sqlite")]
            Transaction::Sqlite(tx) => tx.rollback().await?,
        }
        log::debug!("event=tx_rollback module=db status=ok driver={:?}", self.driver);
        Ok(())
    }

    /// 是否已经提交或回滚
    pub async fn is_finished(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

#[async_trait]
impl DbExecutor for DbTransaction {
    type Error = DbPoolError;

    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Record>> {
        with_transaction!(self, conn, Db => crud::fetch_records::<Db, _>(conn, sql, params).await)
    }

    async fn execute(&self, sql: &str, params: &Params) -> Result<u64> {
        with_transaction!(self, conn, Db => crud::execute_statement::<Db, _>(conn, sql, params).await)
    }

    async fn insert(&self, table: &str, record: &Record, upsert: bool) -> Result<Option<BindValue>> {
        with_transaction!(self, conn, Db => {
            let info = crud::table_info::<Db, _>(&mut *conn, table).await?;
            crud::insert_record::<Db, _>(conn, &info, record, upsert).await
        })
    }

    async fn reduce_to_insertable_columns(&self, record: &Record, table: &str) -> Result<Record> {
        with_transaction!(self, conn, Db => {
            let info = crud::table_info::<Db, _>(conn, table).await?;
            Ok(info.reduce(record))
        })
    }
}

impl DbPool {
    /// 开始一个事务
    pub async fn begin(&self) -> Result<DbTransaction> {
        let tx = match self.driver() {
            #[cfg(feature = "mysql")]
            DbDriver::MySql => {
                let pool = self.mysql_pool().ok_or(DbPoolError::NoPoolAvailable)?;
                Transaction::MySql(pool.begin().await?)
            }
            #[cfg(feature = "postgres")]
            DbDriver::Postgres => {
                let pool = self.pg_pool().ok_or(DbPoolError::NoPoolAvailable)?;
                Transaction::Postgres(pool.begin().await?)
            }
            #[cfg(feature = "sqlite")]
            DbDriver::Sqlite => {
                let pool = self.sqlite_pool().ok_or(DbPoolError::NoPoolAvailable)?;
                Transaction::Sqlite(pool.begin().await?)
            }
            #[allow(unreachable_patterns)]
            _ => return Err(DbPoolError::NoPoolAvailable),
        };
        log::debug!("event=tx_begin module=db status=ok driver={:?}", self.driver());
        Ok(DbTransaction {
            driver: self.driver(),
            inner: Mutex::new(Some(tx)),
        })
    }
}
