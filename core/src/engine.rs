//! 与表无关的 CRUD 引擎
//!
//! 引擎只持有三项构造参数（模型名、表名、主键定义），不缓存任何数据库状态。
//! 执行器在每次调用时传入，可以是连接池、事务或测试替身。

use crate::condition::{render_equality, to_parameters};
use crate::criteria::Criteria;
use crate::error::{CrudError, Result};
use crate::executor::DbExecutor;
use crate::key::{PrimaryKeySpec, PrimaryKeyValue};
use crate::record::{Params, Record};
use crate::traits::Model;
use log::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrudEngine {
    model: String,
    table: String,
    primary_key: PrimaryKeySpec,
}

impl CrudEngine {
    /// 创建引擎；表名为空或主键定义为空时返回 `CrudError::Configuration`
    pub fn new(
        model: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<PrimaryKeySpec>,
    ) -> Result<Self> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(CrudError::Configuration(
                "table name must not be empty".to_string(),
            ));
        }
        let primary_key = primary_key.into();
        primary_key.validate()?;
        Ok(Self {
            model: model.into(),
            table,
            primary_key,
        })
    }

    /// 按模型元数据创建引擎
    pub fn for_model<M: Model>() -> Result<Self> {
        Self::new(
            M::MODEL,
            M::TABLE,
            PrimaryKeySpec::from_columns(M::PRIMARY_KEY.iter().copied()),
        )
    }

    pub fn main_table(&self) -> &str {
        &self.table
    }

    pub fn model_identifier(&self) -> &str {
        &self.model
    }

    pub fn primary_key(&self) -> &PrimaryKeySpec {
        &self.primary_key
    }

    /// 查询全部匹配的行
    ///
    /// 没有条件（或条件渲染为空）时不生成 WHERE 子句。
    /// 返回的行与执行器返回的顺序一致，不做任何过滤、排序或截断。
    pub async fn fetch_all<E>(&self, executor: &E, criteria: Option<&Criteria>) -> Result<Vec<Record>>
    where
        E: DbExecutor + ?Sized,
    {
        let mut sql = format!("SELECT * FROM {}", self.table);
        let mut params = Params::new();
        if let Some(condition) = criteria.and_then(Criteria::condition) {
            let rendered = condition.render();
            if !rendered.trim().is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&rendered);
                params = condition.parameters();
            }
        }

        debug!(
            "event=fetch_all module=crud table={} sql={} params={:?}",
            self.table,
            sql,
            params.keys().collect::<Vec<_>>()
        );
        executor
            .query(&sql, &params)
            .await
            .map_err(|err| self.persistence_error("fetch_all", err))
    }

    /// 返回第一条匹配的行；没有匹配时返回 `Ok(None)`
    ///
    /// 不追加 LIMIT，条件应当已经把结果限定在至多一行。
    pub async fn fetch_one<E>(&self, executor: &E, criteria: Option<&Criteria>) -> Result<Option<Record>>
    where
        E: DbExecutor + ?Sized,
    {
        let rows = self.fetch_all(executor, criteria).await?;
        Ok(rows.into_iter().next())
    }

    /// 插入一行，主键冲突时就地更新
    pub async fn save<E>(&self, executor: &E, record: &Record) -> Result<PrimaryKeyValue>
    where
        E: DbExecutor + ?Sized,
    {
        self.write(executor, record, true, "save").await
    }

    /// 插入一行，主键冲突由数据库报错并以 `CrudError::Persistence` 返回
    pub async fn insert<E>(&self, executor: &E, record: &Record) -> Result<PrimaryKeyValue>
    where
        E: DbExecutor + ?Sized,
    {
        self.write(executor, record, false, "insert").await
    }

    /// 按主键删除；没有匹配的行不算错误
    ///
    /// 标量只适用于单列主键；映射需恰好包含全部主键列，
    /// 生成的条件按映射的列顺序排列。
    pub async fn delete<E, K>(&self, executor: &E, key: K) -> Result<()>
    where
        E: DbExecutor + ?Sized,
        K: Into<PrimaryKeyValue>,
    {
        let conditions = self.primary_key.bind(key.into())?;
        let sql = format!("DELETE FROM {} WHERE {}", self.table, render_equality(&conditions));
        let params = to_parameters(&conditions);

        debug!(
            "event=delete module=crud table={} sql={} params={:?}",
            self.table,
            sql,
            params.keys().collect::<Vec<_>>()
        );
        executor
            .execute(&sql, &params)
            .await
            .map_err(|err| self.persistence_error("delete", err))?;
        Ok(())
    }

    /// 关联查询片段不由引擎生成
    pub fn related_join_fragment(&self, relation: &str) -> Result<String> {
        Err(CrudError::NotImplemented(format!(
            "join fragment for relation `{}` of {}",
            relation, self.model
        )))
    }

    /// 过滤列、插入，再确定主键值
    ///
    /// 数据库生成的主键优先；没有生成时从传入的记录中取主键列。
    /// 复合主键不会由数据库生成，缺列时在写入前返回 `InvalidKey`。
    /// 单列主键缺失且数据库也没有生成时，行已经写入，返回的 `InvalidKey`
    /// 表示该行无法定位。
    async fn write<E>(
        &self,
        executor: &E,
        record: &Record,
        upsert: bool,
        operation: &'static str,
    ) -> Result<PrimaryKeyValue>
    where
        E: DbExecutor + ?Sized,
    {
        if self.primary_key.is_composite() {
            self.primary_key.resolve(record)?;
        }

        let reduced = executor
            .reduce_to_insertable_columns(record, &self.table)
            .await
            .map_err(|err| self.persistence_error(operation, err))?;

        debug!(
            "event={} module=crud table={} upsert={} columns={:?}",
            operation,
            self.table,
            upsert,
            reduced.columns().collect::<Vec<_>>()
        );
        let generated = executor
            .insert(&self.table, &reduced, upsert)
            .await
            .map_err(|err| self.persistence_error(operation, err))?;

        match generated {
            Some(value) if !value.is_null() => Ok(PrimaryKeyValue::Scalar(value)),
            _ => self.primary_key.resolve(record),
        }
    }

    fn persistence_error<Err>(&self, operation: &'static str, err: Err) -> CrudError
    where
        Err: std::error::Error + Send + Sync + 'static,
    {
        error!(
            "event={} module=crud table={} model={} status=error error={}",
            operation, self.table, self.model, err
        );
        CrudError::Persistence {
            model: self.model.clone(),
            table: self.table.clone(),
            operation,
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::RawCondition;
    use crate::filter::Filter;
    use crate::record;
    use crate::value::BindValue;
    use async_trait::async_trait;
    use std::error::Error as _;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("mock failure: {0}")]
    struct MockError(String);

    /// 记录每次调用的内存执行器
    #[derive(Default)]
    struct MockExecutor {
        rows: Vec<Record>,
        generated: Option<BindValue>,
        /// 可写入的列；为空时不过滤
        writable: Vec<&'static str>,
        fail: bool,
        calls: Mutex<Vec<(String, Params)>>,
        inserts: Mutex<Vec<(String, Record, bool)>>,
    }

    impl MockExecutor {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn check(&self) -> std::result::Result<(), MockError> {
            if self.fail {
                Err(MockError("connection reset".to_string()))
            } else {
                Ok(())
            }
        }

        fn last_call(&self) -> (String, Params) {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl DbExecutor for MockExecutor {
        type Error = MockError;

        async fn query(&self, sql: &str, params: &Params) -> std::result::Result<Vec<Record>, MockError> {
            self.calls.lock().unwrap().push((sql.to_string(), params.clone()));
            self.check()?;
            Ok(self.rows.clone())
        }

        async fn execute(&self, sql: &str, params: &Params) -> std::result::Result<u64, MockError> {
            self.calls.lock().unwrap().push((sql.to_string(), params.clone()));
            self.check()?;
            Ok(0)
        }

        async fn insert(
            &self,
            table: &str,
            record: &Record,
            upsert: bool,
        ) -> std::result::Result<Option<BindValue>, MockError> {
            self.inserts
                .lock()
                .unwrap()
                .push((table.to_string(), record.clone(), upsert));
            self.check()?;
            Ok(self.generated.clone())
        }

        async fn reduce_to_insertable_columns(
            &self,
            record: &Record,
            _table: &str,
        ) -> std::result::Result<Record, MockError> {
            let mut reduced = record.clone();
            if !self.writable.is_empty() {
                reduced.retain(|column, _| self.writable.iter().any(|w| *w == column));
            }
            Ok(reduced)
        }
    }

    fn users() -> CrudEngine {
        CrudEngine::new("User", "users", "id").unwrap()
    }

    fn memberships() -> CrudEngine {
        CrudEngine::new("Membership", "memberships", ["org_id", "user_id"]).unwrap()
    }

    // ========== 构造测试 ==========
    #[test]
    fn test_new_rejects_empty_table_and_key() {
        assert!(matches!(
            CrudEngine::new("User", "", "id"),
            Err(CrudError::Configuration(_))
        ));
        assert!(matches!(
            CrudEngine::new("User", "users", ""),
            Err(CrudError::Configuration(_))
        ));
        assert!(matches!(
            CrudEngine::new("User", "users", Vec::<String>::new()),
            Err(CrudError::Configuration(_))
        ));
    }

    #[test]
    fn test_accessors_return_constructor_values() {
        let engine = memberships();
        assert_eq!(engine.main_table(), "memberships");
        assert_eq!(engine.model_identifier(), "Membership");
        assert_eq!(
            engine.primary_key(),
            &PrimaryKeySpec::Composite(vec!["org_id".to_string(), "user_id".to_string()])
        );
    }

    #[test]
    fn test_for_model() {
        struct Order;
        impl Model for Order {
            const MODEL: &'static str = "Order";
            const TABLE: &'static str = "orders";
            const PRIMARY_KEY: &'static [&'static str] = &["id"];
        }
        let engine = CrudEngine::for_model::<Order>().unwrap();
        assert_eq!(engine.main_table(), "orders");
        assert_eq!(engine.primary_key(), &PrimaryKeySpec::Single("id".to_string()));
    }

    #[tokio::test]
    async fn test_single_column_list_key_resolves_to_scalar() {
        let executor = MockExecutor::default();
        let engine = CrudEngine::new("User", "users", ["id"]).unwrap();
        assert_eq!(engine, users());
        let key = engine
            .insert(&executor, &record! { "id" => 7, "name" => "a" })
            .await
            .unwrap();
        assert_eq!(key, PrimaryKeyValue::from(7));
    }

    // ========== fetch 测试 ==========
    #[tokio::test]
    async fn test_fetch_all_without_criteria() {
        let executor = MockExecutor {
            rows: vec![record! { "id" => 2 }, record! { "id" => 1 }],
            ..Default::default()
        };
        let rows = users().fetch_all(&executor, None).await.unwrap();
        assert_eq!(rows, vec![record! { "id" => 2 }, record! { "id" => 1 }]);
        let (sql, params) = executor.last_call();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_with_empty_criteria() {
        let executor = MockExecutor::default();
        users()
            .fetch_all(&executor, Some(&Criteria::new()))
            .await
            .unwrap();
        assert_eq!(executor.last_call().0, "SELECT * FROM users");

        let criteria = Criteria::with_condition(Filter::new());
        users().fetch_all(&executor, Some(&criteria)).await.unwrap();
        assert_eq!(executor.last_call().0, "SELECT * FROM users");
    }

    #[tokio::test]
    async fn test_fetch_all_uses_rendered_condition() {
        let executor = MockExecutor::default();
        let filter = Filter::new().and_eq("status", 1).and_like("name", "al");
        let expected = filter.params().clone();
        let criteria = Criteria::with_condition(filter);
        users().fetch_all(&executor, Some(&criteria)).await.unwrap();

        let (sql, params) = executor.last_call();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE status = :status AND name LIKE :name"
        );
        assert_eq!(params, expected);
    }

    #[tokio::test]
    async fn test_fetch_one_returns_first_or_none() {
        let many = MockExecutor {
            rows: vec![record! { "id" => 1 }, record! { "id" => 2 }, record! { "id" => 3 }],
            ..Default::default()
        };
        let criteria = Criteria::with_condition(RawCondition::new("id > :min").bind("min", 0));
        let first = users().fetch_one(&many, Some(&criteria)).await.unwrap();
        assert_eq!(first, Some(record! { "id" => 1 }));

        let none = MockExecutor::default();
        assert_eq!(users().fetch_one(&none, Some(&criteria)).await.unwrap(), None);
    }

    // ========== insert / save 测试 ==========
    #[tokio::test]
    async fn test_insert_falls_back_to_record_key() {
        let executor = MockExecutor::default();
        let key = users()
            .insert(&executor, &record! { "id" => 10, "name" => "a" })
            .await
            .unwrap();
        assert_eq!(key, PrimaryKeyValue::from(10));
        let inserts = executor.inserts.lock().unwrap();
        assert_eq!(inserts[0].0, "users");
        assert!(!inserts[0].2);
    }

    #[tokio::test]
    async fn test_insert_composite_key_projection() {
        let executor = MockExecutor::default();
        let key = memberships()
            .insert(&executor, &record! { "role" => "admin", "user_id" => 2, "org_id" => 1 })
            .await
            .unwrap();
        assert_eq!(
            key,
            PrimaryKeyValue::Keyed(record! { "org_id" => 1, "user_id" => 2 })
        );
    }

    #[tokio::test]
    async fn test_generated_key_takes_precedence() {
        let executor = MockExecutor {
            generated: Some(BindValue::Int64(99)),
            ..Default::default()
        };
        let key = users()
            .insert(&executor, &record! { "id" => 10, "name" => "a" })
            .await
            .unwrap();
        assert_eq!(key, PrimaryKeyValue::from(99));
    }

    #[tokio::test]
    async fn test_null_generated_key_is_ignored() {
        let executor = MockExecutor {
            generated: Some(BindValue::Null),
            ..Default::default()
        };
        let key = users()
            .save(&executor, &record! { "id" => 4 })
            .await
            .unwrap();
        assert_eq!(key, PrimaryKeyValue::from(4));
    }

    #[tokio::test]
    async fn test_save_requests_upsert_with_reduced_record() {
        let executor = MockExecutor {
            writable: vec!["id", "name"],
            ..Default::default()
        };
        let key = users()
            .save(&executor, &record! { "id" => 3, "name" => "b", "nickname" => "x" })
            .await
            .unwrap();
        assert_eq!(key, PrimaryKeyValue::from(3));

        let inserts = executor.inserts.lock().unwrap();
        let (_, written, upsert) = &inserts[0];
        assert!(*upsert);
        assert_eq!(written, &record! { "id" => 3, "name" => "b" });
    }

    #[tokio::test]
    async fn test_fallback_uses_input_record_not_reduced() {
        // 主键列不在可写列中时仍从原始记录取值
        let executor = MockExecutor {
            writable: vec!["name"],
            ..Default::default()
        };
        let key = users()
            .save(&executor, &record! { "id" => 8, "name" => "b" })
            .await
            .unwrap();
        assert_eq!(key, PrimaryKeyValue::from(8));
    }

    #[tokio::test]
    async fn test_insert_missing_key_without_generated_value() {
        let executor = MockExecutor::default();
        let err = users()
            .insert(&executor, &record! { "name" => "a" })
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_composite_key_missing_column_rejected_before_write() {
        let executor = MockExecutor::default();
        let err = memberships()
            .save(&executor, &record! { "org_id" => 1, "role" => "admin" })
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::InvalidKey(_)));
        assert!(executor.inserts.lock().unwrap().is_empty());
    }

    // ========== delete 测试 ==========
    #[tokio::test]
    async fn test_delete_scalar() {
        let executor = MockExecutor::default();
        users().delete(&executor, 5).await.unwrap();
        let (sql, params) = executor.last_call();
        assert_eq!(sql, "DELETE FROM users WHERE id = :id");
        assert_eq!(params.len(), 1);
        assert_eq!(params[":id"], BindValue::Int64(5));
    }

    #[tokio::test]
    async fn test_delete_composite_follows_mapping_order() {
        let executor = MockExecutor::default();
        memberships()
            .delete(&executor, record! { "user_id" => 2, "org_id" => 1 })
            .await
            .unwrap();
        let (sql, params) = executor.last_call();
        assert_eq!(
            sql,
            "DELETE FROM memberships WHERE user_id = :user_id AND org_id = :org_id"
        );
        assert_eq!(params[":org_id"], BindValue::Int64(1));
        assert_eq!(params[":user_id"], BindValue::Int64(2));
    }

    #[tokio::test]
    async fn test_delete_single_key_accepts_mapping() {
        let executor = MockExecutor::default();
        users().delete(&executor, record! { "id" => 1 }).await.unwrap();
        assert_eq!(executor.last_call().0, "DELETE FROM users WHERE id = :id");
    }

    #[tokio::test]
    async fn test_delete_rejects_mismatched_key() {
        let executor = MockExecutor::default();
        let err = memberships().delete(&executor, 1).await.unwrap_err();
        assert!(matches!(err, CrudError::InvalidKey(_)));
        let err = memberships()
            .delete(&executor, record! { "org_id" => 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::InvalidKey(_)));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    // ========== 错误包装测试 ==========
    #[tokio::test]
    async fn test_executor_failures_become_persistence_errors() {
        let executor = MockExecutor::failing();
        let engine = users();

        let errors = vec![
            engine.fetch_all(&executor, None).await.unwrap_err(),
            engine.fetch_one(&executor, None).await.unwrap_err(),
            engine.save(&executor, &record! { "id" => 1 }).await.unwrap_err(),
            engine.insert(&executor, &record! { "id" => 1 }).await.unwrap_err(),
            engine.delete(&executor, 1).await.unwrap_err(),
        ];
        for err in errors {
            assert!(err.is_persistence(), "unexpected error: {err}");
            let cause = err.source().unwrap().downcast_ref::<MockError>().unwrap();
            assert_eq!(cause.0, "connection reset");
        }
    }

    #[tokio::test]
    async fn test_persistence_error_carries_context() {
        let executor = MockExecutor::failing();
        match users().delete(&executor, 1).await {
            Err(CrudError::Persistence {
                model,
                table,
                operation,
                ..
            }) => {
                assert_eq!(model, "User");
                assert_eq!(table, "users");
                assert_eq!(operation, "delete");
            }
            other => panic!("expected persistence error, got {:?}", other),
        }
    }

    #[test]
    fn test_related_join_fragment_not_implemented() {
        for relation in ["posts", "", "org.members"] {
            assert!(matches!(
                users().related_join_fragment(relation),
                Err(CrudError::NotImplemented(_))
            ));
        }
    }
}
