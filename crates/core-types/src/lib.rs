//! # Core types
//!
//! The value model shared by every other crate: [`Value`] (one column value),
//! [`SqlType`] (the column type inferred for a value), [`Fields`] and
//! [`Record`] (rows going in and coming out), and the [`pg`] module which maps
//! them onto the PostgreSQL driver.

pub mod error;
pub mod pg;
pub mod record;
pub mod sql_type;
pub mod value;

// Re-export the core types to provide a clean public API.
pub use error::CoreError;
pub use record::{Fields, ID_COLUMN, Record};
pub use sql_type::SqlType;
pub use value::Value;
