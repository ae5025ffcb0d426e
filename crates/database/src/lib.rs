//! # Bigbeans Database Crate
//!
//! A small asynchronous convenience layer over PostgreSQL. Rows go in as
//! ordered column -> value maps and come back as [`Record`]s; tables and
//! columns are created on the fly from the values being written.
//!
//! ## Architectural Principles
//!
//! - **Thin Adapter:** The PostgreSQL wire protocol, connection pooling and
//!   type codecs all belong to `sqlx`. This crate only decides which SQL to
//!   send and which Rust type each value travels as.
//! - **Automatic Schema:** A write to a missing table creates it (with an
//!   `_id serial PRIMARY KEY`); a write naming a missing column adds it. Column
//!   types are inferred from the written values.
//! - **Names Validated, Values Bound:** Table and column names must be plain
//!   identifiers and are always quoted. Values are always bound parameters.
//! - **Asynchronous & Pooled:** All operations are asynchronous and run on a
//!   shared `PgPool`.
//!
//! ## Public API
//!
//! - `Databean`: the connection handle. `Databean::table` returns a `Table`.
//! - `Table`: `insert`, `insert_many`, `find`, `find_one`, `all`, `get`,
//!   `count`, `update`, `upsert`, `delete`, `drop`.
//! - `connect` / `connect_from_env`: create a bare `PgPool`.
//! - `DbError`: the specific error types that can be returned from this crate.
//!
//! ```no_run
//! use core_types::fields;
//! use database::{Databean, DbError};
//! use configuration::DatabaseSettings;
//!
//! # async fn run() -> Result<(), DbError> {
//! let bean = Databean::connect(&DatabaseSettings::new("postgres", "secret", "localhost", 5432)).await?;
//! let pantry = bean.table("pantry")?;
//! pantry.insert(&fields! { "name" => "pinto", "count" => 12 }).await?;
//! let pintos = pantry.find(&fields! { "name" => "pinto" }).await?;
//! # Ok(())
//! # }
//! ```

// Declare the modules that constitute this crate.
mod bean;
pub mod connection;
pub mod error;
pub mod ident;
pub mod query;
mod table;

// Re-export the key components to create a clean, public-facing API.
pub use bean::Databean;
pub use connection::{connect, connect_from_env};
pub use core_types::{fields, Fields, Record, Value};
pub use error::DbError;
pub use table::{Table, Upsert};
