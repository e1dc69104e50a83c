//! 基于 sqlx 的通用 CRUD 引擎
//!
//! 引擎按模型名、表名与主键定义构造，每次调用时传入执行器：
//!
//! ```rust,ignore
//! let pool = DbPool::connect("sqlite::memory:").await?;
//! let engine = CrudEngine::new("User", "users", "id")?;
//! let key = engine.save(&pool, &record! { "name" => "alice" }).await?;
//! let rows = engine
//!     .fetch_all(&pool, Some(&Filter::new().and_eq("name", "alice").into()))
//!     .await?;
//! ```

mod condition;
pub mod criteria;
pub mod crud;
pub mod database_info;
pub mod db_pool;
pub mod engine;
pub mod error;
pub mod executor;
pub mod filter;
pub mod key;
pub mod record;
pub mod schema;
pub mod traits;
pub mod transaction;
pub mod utils;
pub mod value;

pub use criteria::{Condition, Criteria, RawCondition};
pub use database_info::DatabaseInfo;
pub use db_pool::{DbDriver, DbPool, DbPoolError};
pub use engine::CrudEngine;
pub use executor::DbExecutor;
pub use filter::Filter;
pub use key::{PrimaryKeySpec, PrimaryKeyValue};
pub use record::{Params, Record};
pub use schema::{ColumnInfo, TableInfo};
pub use traits::{Crud, IntoRecord, Model};
pub use transaction::DbTransaction;
pub use value::BindValue;

// 重新导出 derive 的所有公共 API（宏）
pub use error::{CrudError, Result};
pub use sqlxcrud_derive::*;
