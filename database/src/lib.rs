//! SQLite-backed implementation of `shopfloor_core`'s Storage Contract.
//!
//! # Usage
//!
//! ```rust,no_run
//! use shopfloor_db::SqliteStorage;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = SqliteStorage::new(":memory:").await?;
//! storage.migrate().await?;
//! # Ok(())
//! # }
//! ```

mod common;
mod sqlite;

pub use sqlite::{SqliteStorage, SqliteTx};

pub use shopfloor_core::error::{CoreError, Result};
