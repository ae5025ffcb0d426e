use crate::connection::connect;
use crate::error::DbError;
use crate::ident;
use crate::query::{self, Statement};
use crate::table::Table;
use configuration::DatabaseSettings;
use core_types::pg::decode_row;
use core_types::{Record, Value};
use indexmap::IndexMap;
use sqlx::PgPool;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A handle to one PostgreSQL database.
///
/// Owns the connection pool and hands out [`Table`] accessors by name. Cloning
/// is cheap; clones share the pool and the accessors.
#[derive(Debug, Clone)]
pub struct Databean {
    inner: Arc<BeanInner>,
}

#[derive(Debug)]
pub(crate) struct BeanInner {
    pool: PgPool,
    /// Accessors handed out so far, in first-lookup order.
    tables: RwLock<IndexMap<String, Table>>,
}

impl BeanInner {
    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Table>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Table>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn forget(&self, table: &str) {
        self.write().shift_remove(table);
    }
}

impl Databean {
    /// Connects with the given credentials and pool settings.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, DbError> {
        Ok(Self::from_pool(connect(settings).await?))
    }

    /// Connects to a `postgres://` URL with default pool settings.
    pub async fn connect_url(url: &str) -> Result<Self, DbError> {
        Self::connect(&DatabaseSettings::from_url(url)).await
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            inner: Arc::new(BeanInner {
                pool,
                tables: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// The accessor for table `name`. Nothing is sent to the server; the table
    /// is created by the first write.
    pub fn table(&self, name: &str) -> Result<Table, DbError> {
        ident::validate(name)?;
        if let Some(table) = self.inner.read().get(name) {
            return Ok(table.clone());
        }

        let table = self
            .inner
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                Table::new(name, self.inner.pool.clone(), Arc::downgrade(&self.inner))
            })
            .clone();
        Ok(table)
    }

    /// How many table accessors have been handed out.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Names of the accessors handed out so far, in first-lookup order.
    pub fn table_names(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Tables that exist in the database's current schema.
    pub async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let names: Vec<String> = sqlx::query_scalar(query::LIST_TABLES)
            .fetch_all(&self.inner.pool)
            .await?;
        Ok(names)
    }

    /// Runs a plain SQL statement and returns the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let stmt = Statement::raw(sql, params.to_vec());
        tracing::debug!(sql = %stmt.sql, "Executing statement.");
        Ok(stmt.query()?.execute(&self.inner.pool).await?.rows_affected())
    }

    /// Runs a plain SQL query and decodes every returned row.
    pub async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DbError> {
        let stmt = Statement::raw(sql, params.to_vec());
        tracing::debug!(sql = %stmt.sql, "Fetching rows.");
        let rows = stmt.query()?.fetch_all(&self.inner.pool).await?;
        Ok(rows.iter().map(decode_row).collect::<Result<_, _>>()?)
    }

    /// Closes the pool. Outstanding queries are allowed to finish.
    pub async fn close(&self) {
        self.inner.pool.close().await;
        tracing::info!("Connection pool closed.");
    }
}
