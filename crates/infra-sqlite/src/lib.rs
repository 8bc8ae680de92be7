// Outbox Infrastructure - SQLite Adapter
// Implements: DurableStore

mod connection;
mod durable_store;
mod migration;

pub use connection::create_pool;
pub use durable_store::{SqliteDurableStore, KEY_PREFIX};
pub use migration::run_migrations;

use outbox_core::error::QueueError;

// sqlx::Error cannot get a From impl into QueueError here (orphan rule),
// so every call site maps explicitly
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> QueueError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite result codes: https://www.sqlite.org/rescode.html
            Some(code) if code.as_ref() == "5" => {
                QueueError::Store(format!("Database locked (SQLITE_BUSY): {}", db_err.message()))
            }
            Some(code) if code.as_ref() == "13" => {
                QueueError::Store(format!("Database full: {}", db_err.message()))
            }
            Some(code) => QueueError::Store(format!(
                "Database error [{}]: {}",
                code.as_ref(),
                db_err.message()
            )),
            None => QueueError::Store(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => QueueError::Store("Row not found".to_string()),
        _ => QueueError::Store(err.to_string()),
    }
}
