//! 工具函数模块

/// 按列类型名选择的解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    UnsignedInt,
    Float,
    Bool,
    Decimal,
    Text,
    Bytes,
    Timestamp,
    Date,
    Time,
    Uuid,
    Json,
    Other,
}

/// SQL 类型名到解码方式的映射
///
/// 类型名来自驱动的 `TypeInfo::name()`，大小写不敏感，
/// 带括号的长度与精度（如 `VARCHAR(255)`）会被忽略。
pub fn value_kind(sql_type: &str) -> ValueKind {
    let upper = sql_type.trim().to_uppercase();
    let base = upper.split('(').next().unwrap_or("").trim();

    if base.ends_with("UNSIGNED") {
        return if base.contains("INT") {
            ValueKind::UnsignedInt
        } else {
            ValueKind::Float
        };
    }

    match base {
        "BOOL" | "BOOLEAN" => ValueKind::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "INT2" | "INT4"
        | "INT8" | "SMALLSERIAL" | "SERIAL" | "BIGSERIAL" | "YEAR" => ValueKind::Int,
        "FLOAT" | "DOUBLE" | "REAL" | "FLOAT4" | "FLOAT8" | "DOUBLE PRECISION" => ValueKind::Float,
        "DECIMAL" | "NUMERIC" => ValueKind::Decimal,
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "BPCHAR" | "NAME"
        | "CITEXT" | "ENUM" | "SET" => ValueKind::Text,
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BYTEA" => {
            ValueKind::Bytes
        }
        "DATETIME" | "TIMESTAMP" | "TIMESTAMPTZ" => ValueKind::Timestamp,
        "DATE" => ValueKind::Date,
        "TIME" | "TIMETZ" => ValueKind::Time,
        "UUID" => ValueKind::Uuid,
        "JSON" | "JSONB" => ValueKind::Json,
        _ => ValueKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind_integers() {
        assert_eq!(value_kind("BIGINT"), ValueKind::Int);
        assert_eq!(value_kind("int4"), ValueKind::Int);
        assert_eq!(value_kind("INTEGER"), ValueKind::Int);
        assert_eq!(value_kind("INT UNSIGNED"), ValueKind::UnsignedInt);
        assert_eq!(value_kind("BIGINT UNSIGNED"), ValueKind::UnsignedInt);
    }

    #[test]
    fn test_value_kind_ignores_length() {
        assert_eq!(value_kind("VARCHAR(255)"), ValueKind::Text);
        assert_eq!(value_kind("DECIMAL(10,2)"), ValueKind::Decimal);
    }

    #[test]
    fn test_value_kind_misc() {
        assert_eq!(value_kind("BOOLEAN"), ValueKind::Bool);
        assert_eq!(value_kind("REAL"), ValueKind::Float);
        assert_eq!(value_kind("BYTEA"), ValueKind::Bytes);
        assert_eq!(value_kind("TIMESTAMPTZ"), ValueKind::Timestamp);
        assert_eq!(value_kind("DATE"), ValueKind::Date);
        assert_eq!(value_kind("UUID"), ValueKind::Uuid);
        assert_eq!(value_kind("jsonb"), ValueKind::Json);
        assert_eq!(value_kind("INET"), ValueKind::Other);
        assert_eq!(value_kind("INT4[]"), ValueKind::Other);
    }
}
