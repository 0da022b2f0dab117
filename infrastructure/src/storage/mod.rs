//! Message persistence

mod sqlite;

pub use sqlite::SqliteMessageStore;
