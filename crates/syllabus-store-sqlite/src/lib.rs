//! SQLite backend for Syllabus.
//!
//! One [`SqliteStore`] serves both sides of sync: on a device it is the
//! local [`StateStore`](syllabus_core::store::StateStore); on the server it
//! is the curriculum registry and backup store. All access goes through
//! [`tokio_rusqlite`], so queries run on a dedicated thread without blocking
//! the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{BACKUP_HISTORY_LIMIT, MIN_BACKUP_INTERVAL_SECS, SqliteStore};

#[cfg(test)]
mod tests;
