use std::fmt;

/// A PostgreSQL column type that the automatic schema can create.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    Text,
    Bool,
    Bytea,
    BigInt,
    Float8,
    Numeric,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Jsonb,
    Array(Box<SqlType>),
}

impl SqlType {
    /// The type as it appears in DDL.
    pub fn as_sql(&self) -> String {
        let base = match self {
            SqlType::Text => "text",
            SqlType::Bool => "bool",
            SqlType::Bytea => "bytea",
            SqlType::BigInt => "bigint",
            SqlType::Float8 => "float8",
            SqlType::Numeric => "numeric",
            SqlType::Uuid => "uuid",
            SqlType::Date => "date",
            SqlType::Time => "time",
            SqlType::Timestamp => "timestamp",
            SqlType::TimestampTz => "timestamptz",
            SqlType::Jsonb => "jsonb",
            SqlType::Array(element) => return format!("{}[]", element.as_sql()),
        };
        base.to_string()
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_ddl_names() {
        assert_eq!(SqlType::BigInt.as_sql(), "bigint");
        assert_eq!(SqlType::TimestampTz.as_sql(), "timestamptz");
        assert_eq!(SqlType::Jsonb.to_string(), "jsonb");
    }

    #[test]
    fn test_array_ddl_name() {
        let ty = SqlType::Array(Box::new(SqlType::Text));
        assert_eq!(ty.as_sql(), "text[]");
    }
}
