//! Persistence collaborators
//!
//! Narrow interfaces over conversation transcripts and user profiles.
//! The chat core only ever stores a message, lists a transcript, and
//! fetches a profile; everything else about storage belongs here.
//!
//! Backend is selected at startup: SQLite via DATABASE_URL when
//! configured, in-memory otherwise.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::{Author, ConversationSummary, StoredMessage, UserProfile};
use crate::Result;

//
// ================= Traits =================
//

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn start_conversation(
        &self,
        convo_id: &str,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn append_message(&self, convo_id: &str, message: StoredMessage) -> Result<()>;

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>>;

    async fn list_messages(&self, convo_id: &str) -> Result<Vec<StoredMessage>>;

    async fn owner_of(&self, convo_id: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

//
// ================= In-Memory Store =================
//

/// In-memory store for development and tests
pub struct InMemoryStore {
    conversations: Arc<RwLock<HashMap<String, (String, DateTime<Utc>)>>>,
    messages: Arc<RwLock<HashMap<String, Vec<StoredMessage>>>>,
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            messages: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed a profile (tests, CLI demos)
    pub async fn insert_profile(&self, user_id: &str, profile: UserProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(user_id.to_string(), profile);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn start_conversation(
        &self,
        convo_id: &str,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(convo_id.to_string())
            .or_insert((user_id.to_string(), started_at));
        Ok(())
    }

    async fn append_message(&self, convo_id: &str, message: StoredMessage) -> Result<()> {
        let mut messages = self.messages.write().await;
        messages
            .entry(convo_id.to_string())
            .or_insert_with(Vec::new)
            .push(message);
        Ok(())
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let conversations = self.conversations.read().await;

        let mut summaries: Vec<ConversationSummary> = conversations
            .iter()
            .filter(|(_, (owner, _))| owner == user_id)
            .map(|(convo_id, (_, started_at))| ConversationSummary {
                convo_id: convo_id.clone(),
                started_at: *started_at,
            })
            .collect();

        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }

    async fn list_messages(&self, convo_id: &str) -> Result<Vec<StoredMessage>> {
        let messages = self.messages.read().await;
        Ok(messages.get(convo_id).cloned().unwrap_or_default())
    }

    async fn owner_of(&self, convo_id: &str) -> Result<Option<String>> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(convo_id)
            .map(|(owner, _)| owner.clone()))
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(user_id).cloned())
    }
}

//
// ================= SQLite Store =================
//

pub struct SqliteStore {
    pool: SqlitePool,
    schema_ready: Arc<OnceCell<()>>,
}

impl SqliteStore {
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| ChatError::DatabaseError(format!("Failed to open SQLite pool: {}", e)))?;

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS conversations (
                      convoId   TEXT PRIMARY KEY,
                      userId    TEXT NOT NULL,
                      startedAt INTEGER NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS messages (
                      msgId   TEXT PRIMARY KEY,
                      convoId TEXT NOT NULL,
                      author  TEXT NOT NULL CHECK(author IN ('user','assistant')),
                      content TEXT NOT NULL,
                      ts      INTEGER NOT NULL,
                      FOREIGN KEY(convoId) REFERENCES conversations(convoId)
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    "CREATE INDEX IF NOT EXISTS idx_msgs_convo ON messages(convoId, ts);",
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS users (
                      userId        TEXT PRIMARY KEY,
                      name          TEXT,
                      region        TEXT,
                      language      TEXT,
                      accessibility TEXT,
                      persona       TEXT
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                ChatError::DatabaseError(format!("Failed to initialize SQLite schema: {}", e))
            })?;

        Ok(())
    }

    fn author_to_db(author: Author) -> &'static str {
        match author {
            Author::User => "user",
            Author::Assistant => "assistant",
        }
    }

    fn author_from_db(author: &str) -> Author {
        match author.to_lowercase().as_str() {
            "assistant" => Author::Assistant,
            _ => Author::User,
        }
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn start_conversation(
        &self,
        convo_id: &str,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            "INSERT OR IGNORE INTO conversations (convoId, userId, startedAt) VALUES (?, ?, ?)",
        )
        .bind(convo_id)
        .bind(user_id)
        .bind(started_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(format!("Failed to start conversation: {}", e)))?;

        Ok(())
    }

    async fn append_message(&self, convo_id: &str, message: StoredMessage) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            "INSERT INTO messages (msgId, convoId, author, content, ts) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(convo_id)
        .bind(Self::author_to_db(message.author))
        .bind(&message.content)
        .bind(message.ts.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(format!("Failed to append message: {}", e)))?;

        Ok(())
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT convoId, startedAt FROM conversations WHERE userId = ? ORDER BY startedAt DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(format!("Failed to list conversations: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let started_ms: i64 = row.try_get("startedAt").unwrap_or(0);
                ConversationSummary {
                    convo_id: row.try_get("convoId").unwrap_or_default(),
                    started_at: DateTime::from_timestamp_millis(started_ms)
                        .unwrap_or_else(Utc::now),
                }
            })
            .collect())
    }

    async fn list_messages(&self, convo_id: &str) -> Result<Vec<StoredMessage>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT msgId, author, content, ts FROM messages WHERE convoId = ? ORDER BY ts ASC",
        )
        .bind(convo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(format!("Failed to list messages: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let raw_id: String = row.try_get("msgId").unwrap_or_default();
                let author: String = row.try_get("author").unwrap_or_else(|_| "user".to_string());
                let ts_ms: i64 = row.try_get("ts").unwrap_or(0);

                StoredMessage {
                    id: Uuid::parse_str(&raw_id).unwrap_or_else(|_| Uuid::new_v4()),
                    author: Self::author_from_db(&author),
                    content: row.try_get("content").unwrap_or_default(),
                    ts: DateTime::from_timestamp_millis(ts_ms).unwrap_or_else(Utc::now),
                }
            })
            .collect())
    }

    async fn owner_of(&self, convo_id: &str) -> Result<Option<String>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT userId FROM conversations WHERE convoId = ?")
            .bind(convo_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                ChatError::DatabaseError(format!("Failed to fetch conversation owner: {}", e))
            })?;

        Ok(row.and_then(|r| r.try_get("userId").ok()))
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            "SELECT name, region, language, accessibility, persona FROM users WHERE userId = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(format!("Failed to fetch user: {}", e)))?;

        Ok(row.map(|r| UserProfile {
            name: r.try_get("name").ok(),
            region: r.try_get("region").ok(),
            language: r.try_get("language").ok(),
            persona: r.try_get("persona").ok(),
            accessibility: r.try_get("accessibility").ok(),
        }))
    }
}

//
// ================= Backend Selection =================
//

/// Pick the storage backend from the environment. SQLite when
/// DATABASE_URL is set and the pool opens, in-memory otherwise.
pub fn build_store() -> (Arc<dyn ConversationStore>, Arc<dyn ProfileStore>) {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        match SqliteStore::connect_lazy(&url) {
            Ok(store) => {
                info!("Conversation store backend: sqlite");
                let store = Arc::new(store);
                return (store.clone(), store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize SQLite store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Conversation store backend: in-memory");
    let store = Arc::new(InMemoryStore::new());
    (store.clone(), store)
}
