use crate::bean::BeanInner;
use crate::error::DbError;
use crate::query::{self, Statement};
use core_types::pg::decode_row;
use core_types::{Fields, ID_COLUMN, Record, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

/// What an upsert ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    /// The number of rows that were updated.
    Updated(u64),
}

/// An accessor for one table.
///
/// Writes create the table, and any column they mention, on first use. Column
/// types are inferred from the written values. Clones share the same schema
/// cache.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    pool: PgPool,
    /// Column names known to exist. `None` until the first schema check.
    columns: Arc<Mutex<Option<HashSet<String>>>>,
    bean: Weak<BeanInner>,
}

impl Table {
    pub(crate) fn new(name: &str, pool: PgPool, bean: Weak<BeanInner>) -> Self {
        Self {
            name: name.to_string(),
            pool,
            columns: Arc::new(Mutex::new(None)),
            bean,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts one row, creating the table or missing columns first.
    pub async fn insert(&self, fields: &Fields) -> Result<(), DbError> {
        if fields.is_empty() {
            return Err(DbError::NothingToInsert);
        }

        match self.insert_row(fields).await {
            // Someone dropped the table behind our back; start over.
            Err(e) if e.is_missing_schema() => {
                self.forget_columns().await;
                self.insert_row(fields).await
            }
            other => other,
        }
    }

    async fn insert_row(&self, fields: &Fields) -> Result<(), DbError> {
        self.ensure_schema(fields).await?;
        let stmt = query::insert(&self.name, fields)?;
        tracing::debug!(table = %self.name, sql = %stmt.sql, "Inserting row.");
        stmt.query()?.execute(&self.pool).await?;
        Ok(())
    }

    /// Inserts every row within a single transaction for atomicity.
    pub async fn insert_many(&self, rows: &[Fields]) -> Result<(), DbError> {
        if rows.is_empty() {
            return Ok(());
        }
        if rows.iter().any(|row| row.is_empty()) {
            return Err(DbError::NothingToInsert);
        }

        // One representative value per column, preferring non-null ones.
        let mut union = Fields::new();
        for row in rows {
            for (name, value) in row {
                let slot = union.entry(name.clone()).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = value.clone();
                }
            }
        }
        self.ensure_schema(&union).await?;

        let mut tx = self.pool.begin().await?;
        for row in rows {
            let stmt = query::insert(&self.name, row)?;
            stmt.query()?.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::debug!(table = %self.name, rows = rows.len(), "Inserted batch.");
        Ok(())
    }

    /// Returns every row whose columns equal the given filters. No filters returns all rows.
    pub async fn find(&self, filters: &Fields) -> Result<Vec<Record>, DbError> {
        let stmt = query::select(&self.name, filters, None)?;
        self.fetch_records(&stmt).await
    }

    /// Like [`Table::find`], but returns at most one row.
    pub async fn find_one(&self, filters: &Fields) -> Result<Option<Record>, DbError> {
        let stmt = query::select(&self.name, filters, Some(1))?;
        let row = match stmt.query()?.fetch_optional(&self.pool).await {
            Ok(row) => row,
            Err(e) => return empty_if_missing(e.into(), None),
        };
        Ok(row.as_ref().map(decode_row).transpose()?)
    }

    pub async fn all(&self) -> Result<Vec<Record>, DbError> {
        self.find(&Fields::new()).await
    }

    /// Fetches the row with the given `_id`.
    pub async fn get(&self, id: i64) -> Result<Record, DbError> {
        self.find_one(&core_types::fields! { ID_COLUMN => id })
            .await?
            .ok_or(DbError::NotFound)
    }

    pub async fn count(&self, filters: &Fields) -> Result<i64, DbError> {
        let stmt = query::count(&self.name, filters)?;
        match stmt.query()?.fetch_one(&self.pool).await {
            Ok(row) => Ok(row.try_get::<i64, _>(0)?),
            Err(e) => empty_if_missing(e.into(), 0),
        }
    }

    /// Sets every entry of `fields` on the rows whose `match_on` columns equal
    /// the values given for them in `fields`. Returns the number of rows updated.
    pub async fn update(&self, match_on: &[&str], fields: &Fields) -> Result<u64, DbError> {
        if fields.is_empty() {
            return Err(DbError::NothingToUpdate);
        }
        let matches = match_values(match_on, fields)?;

        self.ensure_schema(fields).await?;
        let stmt = query::update(&self.name, fields, &matches)?;
        tracing::debug!(table = %self.name, sql = %stmt.sql, "Updating rows.");
        Ok(stmt.query()?.execute(&self.pool).await?.rows_affected())
    }

    /// Updates the row matching `match_on` if there is one, otherwise inserts `fields`.
    pub async fn upsert(&self, match_on: &[&str], fields: &Fields) -> Result<Upsert, DbError> {
        if fields.is_empty() {
            return Err(DbError::NothingToInsert);
        }
        let matches = match_values(match_on, fields)?;

        self.ensure_schema(fields).await?;
        let mut tx = self.pool.begin().await?;

        let mut lookup = query::select(&self.name, &matches, Some(1))?;
        lookup.sql.push_str(" FOR UPDATE");
        let existing = lookup.query()?.fetch_optional(&mut *tx).await?;

        let outcome = match existing {
            Some(row) => {
                // Pin the update to the row we found when the table has an `_id`.
                let target = match row_id(&row) {
                    Some(id) => core_types::fields! { ID_COLUMN => id },
                    None => matches,
                };
                let stmt = query::update(&self.name, fields, &target)?;
                Upsert::Updated(stmt.query()?.execute(&mut *tx).await?.rows_affected())
            }
            None => {
                let stmt = query::insert(&self.name, fields)?;
                stmt.query()?.execute(&mut *tx).await?;
                Upsert::Inserted
            }
        };

        tx.commit().await?;
        tracing::debug!(table = %self.name, ?outcome, "Upsert complete.");
        Ok(outcome)
    }

    /// Deletes the rows matching `filters`; no filters deletes every row.
    pub async fn delete(&self, filters: &Fields) -> Result<u64, DbError> {
        let stmt = query::delete(&self.name, filters)?;
        match stmt.query()?.execute(&self.pool).await {
            Ok(result) => Ok(result.rows_affected()),
            Err(e) => empty_if_missing(e.into(), 0),
        }
    }

    /// Drops the table with all its rows and forgets this accessor.
    pub async fn drop(&self) -> Result<(), DbError> {
        let stmt = query::drop_table(&self.name)?;
        stmt.query()?.execute(&self.pool).await?;
        tracing::info!(table = %self.name, "Dropped table.");

        self.forget_columns().await;
        if let Some(bean) = self.bean.upgrade() {
            bean.forget(&self.name);
        }
        Ok(())
    }

    async fn fetch_records(&self, stmt: &Statement) -> Result<Vec<Record>, DbError> {
        let rows = match stmt.query()?.fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => return empty_if_missing(e.into(), Vec::new()),
        };
        Ok(rows.iter().map(decode_row).collect::<Result<_, _>>()?)
    }

    async fn forget_columns(&self) {
        *self.columns.lock().await = None;
    }

    /// Makes sure the table and every column in `fields` exist.
    ///
    /// Column types come from the values; a null value gives `text`. Existing
    /// columns are never altered.
    async fn ensure_schema(&self, fields: &Fields) -> Result<(), DbError> {
        let mut known = self.columns.lock().await;

        let missing: Fields = fields
            .iter()
            .filter(|(name, _)| {
                !known
                    .as_ref()
                    .is_some_and(|columns| columns.contains(name.as_str()))
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if known.is_some() && missing.is_empty() {
            return Ok(());
        }

        let columns = query::column_types(&missing)?;
        let mut conn = self.pool.acquire().await?;

        let exists: bool = sqlx::query_scalar(query::TABLE_EXISTS)
            .bind(&self.name)
            .fetch_one(&mut *conn)
            .await?;

        if !exists {
            let stmt = query::create_table(&self.name, &columns)?;
            tracing::info!(table = %self.name, sql = %stmt.sql, "Creating table.");
            stmt.query()?.execute(&mut *conn).await?;
        } else if !columns.is_empty() {
            let stmt = query::add_columns(&self.name, &columns)?;
            tracing::info!(table = %self.name, sql = %stmt.sql, "Adding columns.");
            stmt.query()?.execute(&mut *conn).await?;
        }

        let names: Vec<String> = sqlx::query_scalar(query::TABLE_COLUMNS)
            .bind(&self.name)
            .fetch_all(&mut *conn)
            .await?;
        *known = Some(names.into_iter().collect());
        Ok(())
    }
}

/// Reads against a table or column that does not exist yet find nothing.
fn empty_if_missing<T>(error: DbError, empty: T) -> Result<T, DbError> {
    if error.is_missing_schema() {
        tracing::debug!(error = %error, "Schema not there yet; returning an empty result.");
        Ok(empty)
    } else {
        Err(error)
    }
}

/// The `_id` of a row, read without decoding its other columns.
fn row_id(row: &PgRow) -> Option<i64> {
    match row.try_get::<Option<i32>, _>(ID_COLUMN) {
        Ok(id) => id.map(i64::from),
        Err(_) => row.try_get::<Option<i64>, _>(ID_COLUMN).ok().flatten(),
    }
}

/// The `match_on` columns with their values taken from `fields`.
fn match_values(match_on: &[&str], fields: &Fields) -> Result<Fields, DbError> {
    if match_on.is_empty() {
        return Err(DbError::EmptyMatch);
    }
    match_on
        .iter()
        .map(|key| {
            fields
                .get(*key)
                .map(|value| (key.to_string(), value.clone()))
                .ok_or_else(|| DbError::MissingMatchKey(key.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::fields;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    #[test]
    fn test_match_values_in_match_order() {
        let fields = fields! { "name" => "pinto", "count" => 3, "colour" => "brown" };
        let matches = match_values(&["colour", "name"], &fields).unwrap();
        assert_eq!(matches, fields! { "colour" => "brown", "name" => "pinto" });
    }

    #[test]
    fn test_match_values_errors() {
        let fields = fields! { "name" => "pinto" };
        assert!(matches!(match_values(&[], &fields), Err(DbError::EmptyMatch)));
        assert!(matches!(
            match_values(&["weight"], &fields),
            Err(DbError::MissingMatchKey(key)) if key == "weight"
        ));
    }

    /// An accessor whose pool cannot reach any server.
    fn offline_table() -> Table {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        Table::new("beans", pool, Weak::new())
    }

    #[tokio::test]
    async fn test_known_columns_skip_the_schema_check() {
        let table = offline_table();
        *table.columns.lock().await = Some(
            ["_id", "name", "count"].into_iter().map(String::from).collect(),
        );

        table
            .ensure_schema(&fields! { "count" => 3, "name" => "pinto" })
            .await
            .unwrap();

        // A new column has to ask the server, which is not there.
        assert!(table.ensure_schema(&fields! { "colour" => "red" }).await.is_err());
    }

    #[tokio::test]
    async fn test_first_write_always_checks_the_schema() {
        let table = offline_table();
        assert!(table.ensure_schema(&fields! { "name" => "pinto" }).await.is_err());
        assert!(table.columns.lock().await.is_none());
    }

    #[test]
    fn test_empty_if_missing_passes_other_errors_through() {
        let result = empty_if_missing(DbError::NotFound, 0);
        assert!(matches!(result, Err(DbError::NotFound)));
    }
}
