use crate::criteria::Criteria;
use crate::engine::CrudEngine;
use crate::error::Result;
use crate::executor::DbExecutor;
use crate::key::PrimaryKeyValue;
use crate::record::Record;

/// Model trait 定义了模型的基本元数据
///
/// 通常由 `#[derive(ModelMeta)]` 生成：
///
/// ```rust,ignore
/// #[derive(ModelMeta)]
/// #[model(table = "memberships", pk = "org_id, user_id")]
/// struct Membership { org_id: i64, user_id: i64, role: String }
/// ```
pub trait Model: Sized {
    /// 模型名，仅用于错误信息与日志
    const MODEL: &'static str;
    /// 表名
    const TABLE: &'static str;
    /// 主键列，复合主键按顺序列出
    const PRIMARY_KEY: &'static [&'static str];
}

/// 把模型实例转换为待写入的行
pub trait IntoRecord {
    fn to_record(&self) -> Record;
}

/// Crud trait 提供了基于 [`CrudEngine`] 的 CRUD 操作
///
/// 所有方法都是默认实现，`#[derive(CRUD)]` 只需要生成空的 `impl`。
#[async_trait::async_trait]
pub trait Crud: Model + IntoRecord + Send + Sync {
    /// 按模型元数据构造引擎
    fn engine() -> Result<CrudEngine> {
        CrudEngine::for_model::<Self>()
    }

    /// 插入或更新当前实例，返回主键值
    async fn save<E>(&self, executor: &E) -> Result<PrimaryKeyValue>
    where
        E: DbExecutor + ?Sized,
    {
        let record = self.to_record();
        Self::engine()?.save(executor, &record).await
    }

    /// 插入当前实例，主键冲突时返回错误
    async fn insert<E>(&self, executor: &E) -> Result<PrimaryKeyValue>
    where
        E: DbExecutor + ?Sized,
    {
        let record = self.to_record();
        Self::engine()?.insert(executor, &record).await
    }

    /// 删除当前实例对应的行
    async fn remove<E>(&self, executor: &E) -> Result<()>
    where
        E: DbExecutor + ?Sized,
    {
        let engine = Self::engine()?;
        let key = engine.primary_key().resolve(&self.to_record())?;
        engine.delete(executor, key).await
    }

    async fn fetch_all<E>(executor: &E, criteria: Option<&Criteria>) -> Result<Vec<Record>>
    where
        E: DbExecutor + ?Sized,
    {
        Self::engine()?.fetch_all(executor, criteria).await
    }

    async fn fetch_one<E>(executor: &E, criteria: Option<&Criteria>) -> Result<Option<Record>>
    where
        E: DbExecutor + ?Sized,
    {
        Self::engine()?.fetch_one(executor, criteria).await
    }

    /// 按主键删除
    async fn delete_by_key<E, K>(executor: &E, key: K) -> Result<()>
    where
        E: DbExecutor + ?Sized,
        K: Into<PrimaryKeyValue> + Send,
    {
        Self::engine()?.delete(executor, key).await
    }
}
