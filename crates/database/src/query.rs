//! SQL statement builders.
//!
//! Every builder validates the identifiers it interpolates and returns the
//! statement text together with its parameters, in `$n` order.

use crate::DbError;
use crate::ident::{quote, validate};
use core_types::pg::{self, PgQuery};
use core_types::{Fields, ID_COLUMN, SqlType, Value};

/// Whether a table exists in the current schema.
pub const TABLE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = current_schema() AND tablename = $1)";

/// Column names of a table in the current schema.
pub const TABLE_COLUMNS: &str = "SELECT column_name::text FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1";

/// Every table in the current schema.
pub const LIST_TABLES: &str =
    "SELECT tablename::text FROM pg_tables WHERE schemaname = current_schema() ORDER BY tablename";

/// A statement ready to be bound and executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    /// Whether the connection may cache the prepared statement. Off for
    /// anything whose result columns can change under it, since a cached
    /// `SELECT *` fails once a column has been added to its table.
    pub persistent: bool,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self {
            sql,
            params,
            persistent: true,
        }
    }

    /// A caller-written statement, passed through untouched and never cached.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(sql.into(), params).uncached()
    }

    fn uncached(mut self) -> Self {
        self.persistent = false;
        self
    }

    /// A `sqlx` query over this statement with every parameter bound.
    pub fn query(&self) -> Result<PgQuery<'_>, DbError> {
        let mut query = sqlx::query(&self.sql).persistent(self.persistent);
        for param in &self.params {
            query = pg::bind(query, param.clone())?;
        }
        Ok(query)
    }
}

/// Column definitions inferred from `fields`, skipping `_id`.
pub fn column_types(fields: &Fields) -> Result<Vec<(String, SqlType)>, DbError> {
    fields
        .iter()
        .filter(|(name, _)| name.as_str() != ID_COLUMN)
        .map(|(name, value)| -> Result<(String, SqlType), DbError> {
            Ok((validate(name)?.to_string(), value.sql_type()?))
        })
        .collect()
}

pub fn create_table(table: &str, columns: &[(String, SqlType)]) -> Result<Statement, DbError> {
    let mut definitions = vec![format!("{ID_COLUMN} serial PRIMARY KEY")];
    for (name, ty) in columns {
        definitions.push(format!("{} {}", quote(validate(name)?), ty));
    }
    Ok(Statement::new(
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(validate(table)?),
            definitions.join(", ")
        ),
        Vec::new(),
    ))
}

pub fn add_columns(table: &str, columns: &[(String, SqlType)]) -> Result<Statement, DbError> {
    let additions = columns
        .iter()
        .map(|(name, ty)| -> Result<String, DbError> {
            Ok(format!("ADD COLUMN IF NOT EXISTS {} {}", quote(validate(name)?), ty))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Statement::new(
        format!("ALTER TABLE {} {}", quote(validate(table)?), additions.join(", ")),
        Vec::new(),
    ))
}

/// `INSERT` for one row. Null values are left to the column default.
pub fn insert(table: &str, fields: &Fields) -> Result<Statement, DbError> {
    let table = quote(validate(table)?);
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for (name, value) in fields.iter().filter(|(_, value)| !value.is_null()) {
        columns.push(quote(validate(name)?));
        params.push(value.clone());
    }

    if columns.is_empty() {
        return Ok(Statement::new(
            format!("INSERT INTO {table} DEFAULT VALUES"),
            params,
        ));
    }

    let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("${i}")).collect();
    Ok(Statement::new(
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    ))
}

/// `WHERE` clause for equality filters, numbering parameters after `offset`.
fn where_clause(filters: &Fields, offset: usize) -> Result<(String, Vec<Value>), DbError> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut conditions = Vec::with_capacity(filters.len());
    let mut params = Vec::new();
    for (name, value) in filters {
        let column = quote(validate(name)?);
        if value.is_null() {
            conditions.push(format!("{column} IS NULL"));
        } else {
            params.push(value.clone());
            conditions.push(format!("{column} = ${}", offset + params.len()));
        }
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}

pub fn select(table: &str, filters: &Fields, limit: Option<u64>) -> Result<Statement, DbError> {
    let (clause, params) = where_clause(filters, 0)?;
    let mut sql = format!("SELECT * FROM {}{clause}", quote(validate(table)?));
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(Statement::new(sql, params).uncached())
}

pub fn count(table: &str, filters: &Fields) -> Result<Statement, DbError> {
    let (clause, params) = where_clause(filters, 0)?;
    Ok(Statement::new(
        format!("SELECT COUNT(*) FROM {}{clause}", quote(validate(table)?)),
        params,
    ))
}

pub fn delete(table: &str, filters: &Fields) -> Result<Statement, DbError> {
    let (clause, params) = where_clause(filters, 0)?;
    Ok(Statement::new(
        format!("DELETE FROM {}{clause}", quote(validate(table)?)),
        params,
    ))
}

/// `UPDATE` setting every entry of `set` on rows equal to `matches`.
pub fn update(table: &str, set: &Fields, matches: &Fields) -> Result<Statement, DbError> {
    if set.is_empty() {
        return Err(DbError::NothingToUpdate);
    }
    if matches.is_empty() {
        return Err(DbError::EmptyMatch);
    }

    let mut assignments = Vec::with_capacity(set.len());
    let mut params = Vec::new();
    for (name, value) in set {
        let column = quote(validate(name)?);
        if value.is_null() {
            assignments.push(format!("{column} = NULL"));
        } else {
            params.push(value.clone());
            assignments.push(format!("{column} = ${}", params.len()));
        }
    }

    let (clause, match_params) = where_clause(matches, params.len())?;
    params.extend(match_params);
    Ok(Statement::new(
        format!(
            "UPDATE {} SET {}{clause}",
            quote(validate(table)?),
            assignments.join(", ")
        ),
        params,
    ))
}

pub fn drop_table(table: &str) -> Result<Statement, DbError> {
    Ok(Statement::new(
        format!("DROP TABLE IF EXISTS {}", quote(validate(table)?)),
        Vec::new(),
    ))
}
