//! SQLite backend for the manga guesser game store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod catalog;
mod encode;
mod schema;
mod store;

pub mod error;

pub use catalog::CatalogImport;
pub use error::{Error, Result};
pub use store::SqliteStore;
