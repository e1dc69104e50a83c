use sqlx::error::BoxDynError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrudError {
    /// 构造参数非法（空表名、空主键定义）
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// 执行器层面的失败，原始错误保存在 `source` 中
    #[error("Persistence error: {model}::{operation} on `{table}` failed: {source}")]
    Persistence {
        model: String,
        table: String,
        operation: &'static str,
        #[source]
        source: BoxDynError,
    },
    /// Not implemented error
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    /// 主键值与主键定义不匹配
    #[error("Invalid primary key: {0}")]
    InvalidKey(String),
}

impl CrudError {
    pub fn is_persistence(&self) -> bool {
        matches!(self, CrudError::Persistence { .. })
    }

    /// 取出被包装的原始执行器错误
    pub fn persistence_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            CrudError::Persistence { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrudError>;
