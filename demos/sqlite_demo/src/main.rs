use std::sync::Arc;

use log::info;
use sqlx::sqlite::SqlitePoolOptions;
use sqlxcrud::{
    record, Crud, CrudEngine, Criteria, DbExecutor, DbPool, Filter, Params, RawCondition, CRUD,
    ModelMeta,
};

#[derive(Debug, Clone, ModelMeta, CRUD)]
#[model(table = "users")]
struct User {
    id: Option<i64>,
    name: String,
    email: Option<String>,
}

#[derive(Debug, Clone, ModelMeta, CRUD)]
#[model(table = "memberships", pk = "org_id, user_id")]
struct Membership {
    org_id: i64,
    user_id: i64,
    role: String,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
    "CREATE TABLE IF NOT EXISTS memberships (org_id INTEGER NOT NULL, user_id INTEGER NOT NULL, \
     role TEXT NOT NULL, PRIMARY KEY (org_id, user_id))",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    // 内存库每个连接都是独立的数据库，只保留一个连接
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    let pool = DbPool::from_sqlite_pool(Arc::new(pool));
    info!("event=demo_start module=demo status=ok url={}", database_url);

    for ddl in SCHEMA {
        pool.execute(ddl, &Params::new()).await?;
    }

    // ========== 1. INSERT (自增主键) ==========
    let alice = User {
        id: None,
        name: "alice".to_string(),
        email: Some("alice@example.com".to_string()),
    };
    let alice_id = alice.insert(&pool).await?;
    println!("插入成功，主键: {:?}", alice_id);

    let bob = User {
        id: None,
        name: "bob".to_string(),
        email: None,
    };
    let bob_id = bob.insert(&pool).await?;
    println!("插入成功，主键: {:?}", bob_id);

    // ========== 2. SAVE (复合主键 upsert) ==========
    let membership = Membership {
        org_id: 1,
        user_id: 1,
        role: "member".to_string(),
    };
    membership.save(&pool).await?;
    let promoted = Membership {
        role: "admin".to_string(),
        ..membership
    };
    let key = promoted.save(&pool).await?;
    println!("upsert 成功，主键: {:?}", key);

    // ========== 3. FETCH (条件查询) ==========
    let criteria: Criteria = Filter::new().and_like("name", "a").into();
    let rows = User::fetch_all(&pool, Some(&criteria)).await?;
    for row in &rows {
        println!("  {}", row.to_json());
    }

    let criteria: Criteria = RawCondition::new("org_id = :org AND role = :role")
        .bind("org", 1)
        .bind("role", "admin")
        .into();
    let admin = Membership::fetch_one(&pool, Some(&criteria)).await?;
    println!("fetch_one 结果: {:?}", admin.map(|row| row.to_json()));

    // ========== 4. 不依赖模型的引擎 ==========
    let engine = CrudEngine::new("UserRow", "users", "id")?;
    let all = engine.fetch_all(&pool, None).await?;
    println!("{} 共 {} 行", engine.main_table(), all.len());

    // ========== 5. TRANSACTION (事务) ==========
    let tx = pool.begin().await?;
    engine
        .save(&tx, &record! { "id" => 100, "name" => "carol", "email" => "carol@example.com" })
        .await?;
    Membership::delete_by_key(&tx, record! { "org_id" => 1, "user_id" => 1 }).await?;
    tx.rollback().await?;
    let remaining = Membership::fetch_all(&pool, None).await?;
    println!("回滚后 memberships 共 {} 行", remaining.len());

    // ========== 6. DELETE (删除) ==========
    User::delete_by_key(&pool, bob_id).await?;
    let users = User::fetch_all(&pool, None).await?;
    println!("删除后 users 共 {} 行", users.len());

    info!("event=demo_finish module=demo status=ok");
    Ok(())
}
