use crate::record::{Params, Record};
use crate::value::BindValue;
use async_trait::async_trait;

/// 数据库执行器 trait，统一 DbPool 和 DbTransaction 的接口
///
/// CRUD 引擎只通过这个 trait 访问数据库，每次调用时由调用方传入，
/// 测试中可以替换为内存实现。
///
/// 注意：此 trait 要求 `Send + Sync`，因为异步方法需要在不同线程之间传递 Future
#[async_trait]
pub trait DbExecutor: Send + Sync {
    /// 执行器自身的错误类型，引擎会把它包装为 `CrudError::Persistence`
    type Error: std::error::Error + Send + Sync + 'static;

    /// 执行查询，SQL 中使用 `:name` 命名占位符
    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Record>, Self::Error>;

    /// 执行不返回行的语句，返回受影响行数
    async fn execute(&self, sql: &str, params: &Params) -> Result<u64, Self::Error>;

    /// 插入一行，`upsert` 为 true 时主键冲突改为更新
    ///
    /// 返回数据库生成的主键值；没有生成主键时返回 `None`
    async fn insert(
        &self,
        table: &str,
        record: &Record,
        upsert: bool,
    ) -> Result<Option<BindValue>, Self::Error>;

    /// 过滤记录，只保留表中存在且可写入的列
    async fn reduce_to_insertable_columns(
        &self,
        record: &Record,
        table: &str,
    ) -> Result<Record, Self::Error>;
}
