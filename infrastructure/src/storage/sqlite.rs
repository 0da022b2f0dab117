//! SQLite message store
//!
//! One connection shared behind a mutex. Every call runs on the blocking
//! pool so the async runtime never waits on disk I/O.

use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use streamchat_application::{MessageStore, StoreError};
use streamchat_domain::{Author, ChatId, Message, NewMessage};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chat (
    id INTEGER PRIMARY KEY AUTOINCREMENT
);
CREATE TABLE IF NOT EXISTS message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chatId INTEGER NOT NULL,
    author TEXT NOT NULL,
    text TEXT NOT NULL,
    FOREIGN KEY (chatId) REFERENCES chat(id)
);
";

fn storage_error(e: rusqlite::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// [`MessageStore`] backed by a SQLite database
#[derive(Clone)]
pub struct SqliteMessageStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMessageStore {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(storage_error)?;
        info!("Opened message database at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(storage_error)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(storage_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the chat row for `chat_id` if it does not exist yet
    pub async fn ensure_chat(&self, chat_id: ChatId) -> Result<(), StoreError> {
        let created = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO chat (id) VALUES (?1)",
                    params![chat_id.get()],
                )
            })
            .await?;
        if created > 0 {
            info!(chat = %chat_id, "Created chat");
        }
        Ok(())
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Storage("connection mutex poisoned".to_string()))?;
            f(&conn).map_err(storage_error)
        })
        .await
        .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert(&self, message: NewMessage) -> Result<Message, StoreError> {
        let NewMessage {
            chat_id,
            author,
            text,
        } = message;
        let body = text.clone();

        let id = self
            .with_conn(move |conn| {
                conn.query_row(
                    "INSERT INTO message (chatId, author, text) VALUES (?1, ?2, ?3) RETURNING id",
                    params![chat_id.get(), author.as_str(), body],
                    |r| r.get::<_, i64>(0),
                )
            })
            .await?;

        debug!(chat = %chat_id, id, author = %author, "Inserted message");
        Ok(Message {
            id,
            chat_id,
            author,
            text,
        })
    }

    async fn list(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, author, text FROM message WHERE chatId = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![chat_id.get()], |r| {
                        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, author, text)| {
                let author: Author = author
                    .parse()
                    .map_err(|e| StoreError::Corrupt(format!("message {id}: {e}")))?;
                Ok(Message {
                    id,
                    chat_id,
                    author,
                    text,
                })
            })
            .collect()
    }
}
