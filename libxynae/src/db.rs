//! Database operations for Xynae
//!
//! Typed, fallible queries over the SQLite activity store. Callers that must
//! keep running without a store go through [`crate::store::ActivityStore`]
//! instead.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{MentionRecord, PostRecord, ReplyRecord, StoreStats};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: String,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes keep the URL valid on Windows; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self {
            pool,
            path: expanded_path,
        })
    }

    /// Filesystem path of the database
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Insert a post record and return its row id
    pub async fn save_post(&self, post: &PostRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (text, category, language, posted, external_id, length, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.text)
        .bind(post.category.as_str())
        .bind(post.language.as_str())
        .bind(post.posted)
        .bind(&post.external_id)
        .bind(post.length as i64)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent posts, newest first
    pub async fn recent_posts(&self, limit: usize) -> Result<Vec<PostRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, category, language, posted, external_id, length, created_at
            FROM posts
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// Record the first observation of a mention
    ///
    /// Returns `false` when the mention was already stored; the existing row
    /// (including its `replied` flag) is left untouched.
    pub async fn save_mention(&self, mention: &MentionRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO mentions
                (external_id, text, author_handle, author_id, replied, replied_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO NOTHING
            "#,
        )
        .bind(&mention.external_id)
        .bind(&mention.text)
        .bind(&mention.author_handle)
        .bind(&mention.author_id)
        .bind(mention.replied)
        .bind(mention.replied_at)
        .bind(mention.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a mention by its platform id
    pub async fn get_mention(&self, external_id: &str) -> Result<Option<MentionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT external_id, text, author_handle, author_id, replied, replied_at, created_at
            FROM mentions WHERE external_id = ?
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| MentionRecord {
            external_id: r.get("external_id"),
            text: r.get("text"),
            author_handle: r.get("author_handle"),
            author_id: r.get("author_id"),
            replied: r.get("replied"),
            replied_at: r.get("replied_at"),
            created_at: r.get("created_at"),
        }))
    }

    /// Flip a mention to replied
    ///
    /// Returns `true` only for the call that performed the flip.
    pub async fn mark_mention_replied(&self, external_id: &str, replied_at: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mentions SET replied = 1, replied_at = ?
            WHERE external_id = ? AND replied = 0
            "#,
        )
        .bind(replied_at)
        .bind(external_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Whether a mention has been replied to
    pub async fn is_mention_replied(&self, external_id: &str) -> Result<bool> {
        let replied = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT replied FROM mentions WHERE external_id = ?
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(replied.unwrap_or(false))
    }

    /// Insert a reply record and return its row id
    pub async fn save_reply(&self, reply: &ReplyRecord) -> Result<i64> {
        let result = insert_reply(reply)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.last_insert_rowid())
    }

    /// Mark the parent mention replied and insert the reply in one transaction
    ///
    /// The mention row is created if it was never saved, so a reply always
    /// leaves its parent marked replied.
    pub async fn record_reply(&self, reply: &ReplyRecord) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT INTO mentions
                (external_id, text, author_handle, author_id, replied, replied_at, created_at)
            VALUES (?, ?, ?, '', 1, ?, ?)
            ON CONFLICT(external_id) DO UPDATE
                SET replied = 1, replied_at = excluded.replied_at
                WHERE mentions.replied = 0
            "#,
        )
        .bind(&reply.parent_external_id)
        .bind(&reply.parent_text)
        .bind(&reply.author_handle)
        .bind(reply.created_at)
        .bind(reply.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        let result = insert_reply(reply)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent replies, newest first
    pub async fn recent_replies(&self, limit: usize) -> Result<Vec<ReplyRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, parent_external_id, parent_text, author_handle, reply_text,
                   reply_external_id, created_at
            FROM replies
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| ReplyRecord {
                id: r.get("id"),
                parent_external_id: r.get("parent_external_id"),
                parent_text: r.get("parent_text"),
                author_handle: r.get("author_handle"),
                reply_text: r.get("reply_text"),
                reply_external_id: r.get("reply_external_id"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Append a conversation event (generation history, diagnostics)
    pub async fn save_conversation_event(
        &self,
        kind: &str,
        content: &str,
        metadata: &serde_json::Value,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversation_events (kind, content, metadata, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(kind)
        .bind(content)
        .bind(metadata.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.last_insert_rowid())
    }

    /// Aggregate counts across all tables
    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            connected: true,
            database: Some(self.path.clone()),
            posts_count: self.count("SELECT COUNT(*) FROM posts").await?,
            posted_posts: self.count("SELECT COUNT(*) FROM posts WHERE posted = 1").await?,
            replies_count: self.count("SELECT COUNT(*) FROM replies").await?,
            mentions_count: self.count("SELECT COUNT(*) FROM mentions").await?,
            replied_mentions: self
                .count("SELECT COUNT(*) FROM mentions WHERE replied = 1")
                .await?,
            conversation_events: self.count("SELECT COUNT(*) FROM conversation_events").await?,
        })
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(count)
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn insert_reply(
    reply: &ReplyRecord,
) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO replies
            (parent_external_id, parent_text, author_handle, reply_text, reply_external_id,
             created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&reply.parent_external_id)
    .bind(&reply.parent_text)
    .bind(&reply.author_handle)
    .bind(&reply.reply_text)
    .bind(&reply.reply_external_id)
    .bind(reply.created_at)
}

fn post_from_row(r: &SqliteRow) -> PostRecord {
    PostRecord {
        id: r.get("id"),
        text: r.get("text"),
        category: r
            .get::<String, _>("category")
            .parse()
            .unwrap_or(crate::content::PostCategory::Insight),
        language: r
            .get::<String, _>("language")
            .parse()
            .unwrap_or(crate::content::Language::English),
        posted: r.get("posted"),
        external_id: r.get("external_id"),
        created_at: r.get("created_at"),
        length: r.get::<i64, _>("length") as usize,
    }
}
