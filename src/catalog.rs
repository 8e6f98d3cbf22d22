//! The persistent video catalog, one SQLite table of caption-searchable
//! records. The pool is built once at startup and injected into handlers;
//! nothing here keeps global state.

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::search::Pattern;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VideoRecord {
    pub id: i64,
    /// Opaque transport handle used to re-send the media. Never re-derived.
    pub file_id: String,
    /// Transport-stable identity of the media, used as a dedup signal.
    pub file_unique_id: String,
    pub caption: String,
    /// 0 when the transport did not report a size.
    pub size_bytes: i64,
    /// Unix milliseconds of the last caption write; drives result ordering.
    pub updated_at: i64,
}

/// A submission that has passed normalization but not yet the dedup gate.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub file_id: String,
    pub file_unique_id: String,
    pub caption: String,
    pub size_bytes: i64,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id TEXT NOT NULL,
    file_unique_id TEXT NOT NULL,
    caption TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
)";

const COLUMNS: &str = "id, file_id, file_unique_id, caption, size_bytes, updated_at";

pub struct VideoCatalog {
    pool: SqlitePool,
}

impl VideoCatalog {
    /// Opens (creating if missing) the catalog and applies the schema.
    pub async fn connect(url: &str) -> sqlx::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // One connection: handlers touch the catalog one statement at a
        // time, and `sqlite::memory:` stays coherent across queries.
        let pool =
            SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn insert(&self, video: NewVideo) -> sqlx::Result<VideoRecord> {
        sqlx::query_as::<_, VideoRecord>(
            "INSERT INTO videos (file_id, file_unique_id, caption, size_bytes, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, file_id, file_unique_id, caption, size_bytes, updated_at",
        )
        .bind(&video.file_id)
        .bind(&video.file_unique_id)
        .bind(&video.caption)
        .bind(video.size_bytes)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: i64) -> sqlx::Result<Option<VideoRecord>> {
        sqlx::query_as::<_, VideoRecord>(&format!(
            "SELECT {COLUMNS} FROM videos WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// A record counts as a duplicate when it shares caption and size, or
    /// when the transport says it is the same file.
    pub async fn find_duplicate(
        &self,
        caption: &str,
        size_bytes: i64,
        file_unique_id: &str,
    ) -> sqlx::Result<Option<VideoRecord>> {
        sqlx::query_as::<_, VideoRecord>(&format!(
            "SELECT {COLUMNS} FROM videos \
             WHERE (caption = ? AND size_bytes = ?) OR file_unique_id = ? \
             LIMIT 1"
        ))
        .bind(caption)
        .bind(size_bytes)
        .bind(file_unique_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Every record, most recently updated first.
    pub async fn all(&self) -> sqlx::Result<Vec<VideoRecord>> {
        sqlx::query_as::<_, VideoRecord>(&format!(
            "SELECT {COLUMNS} FROM videos ORDER BY updated_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// Full-catalog scan filtered through the pattern; ordering follows
    /// [`Self::all`]. The scan is re-run on every pagination step, so
    /// results always reflect the current catalog state.
    pub async fn search(&self, pattern: &Pattern) -> sqlx::Result<Vec<VideoRecord>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|record| pattern.matches(&record.caption))
            .collect())
    }

    pub async fn count(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM videos").fetch_one(&self.pool).await
    }

    /// Rewrites a caption in place and refreshes its `updated_at` stamp.
    pub async fn update_caption(&self, id: i64, caption: &str) -> sqlx::Result<()> {
        sqlx::query("UPDATE videos SET caption = ?, updated_at = ? WHERE id = ?")
            .bind(caption)
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn memory_catalog() -> VideoCatalog {
        VideoCatalog::connect("sqlite::memory:").await.expect("in-memory catalog")
    }

    fn submission(caption: &str, size_bytes: i64, unique: &str) -> NewVideo {
        NewVideo {
            file_id: format!("file-{unique}"),
            file_unique_id: unique.to_string(),
            caption: caption.to_string(),
            size_bytes,
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_round_trips() {
        let catalog = memory_catalog().await;
        let stored = catalog
            .insert(submission("The Great Escape 1963", 42, "u1"))
            .await
            .expect("insert");
        assert!(stored.id >= 1);

        let found = catalog.find_by_id(stored.id).await.expect("query");
        assert_eq!(found, Some(stored));
        assert_eq!(catalog.find_by_id(9999).await.expect("query"), None);
    }

    #[tokio::test]
    async fn search_filters_and_orders_most_recent_first() {
        let catalog = memory_catalog().await;
        let escape = catalog
            .insert(submission("The Great Escape 1963", 1, "u1"))
            .await
            .expect("insert");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let wall = catalog.insert(submission("Great Wall 2016", 2, "u2")).await.expect("insert");
        tokio::time::sleep(Duration::from_millis(5)).await;
        catalog.insert(submission("Escape Room", 3, "u3")).await.expect("insert");

        let pattern = Pattern::build("great").expect("valid query");
        let matches = catalog.search(&pattern).await.expect("search");
        assert_eq!(
            matches.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![wall.id, escape.id]
        );

        // A caption rewrite bumps the record back to the front.
        tokio::time::sleep(Duration::from_millis(5)).await;
        catalog.update_caption(escape.id, "The Great Escape 1963 remastered").await.expect("update");
        let matches = catalog.search(&pattern).await.expect("search");
        assert_eq!(
            matches.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![escape.id, wall.id]
        );
    }

    #[tokio::test]
    async fn count_tracks_inserts() {
        let catalog = memory_catalog().await;
        assert_eq!(catalog.count().await.expect("count"), 0);
        catalog.insert(submission("A", 1, "u1")).await.expect("insert");
        catalog.insert(submission("B", 2, "u2")).await.expect("insert");
        assert_eq!(catalog.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn duplicate_lookup_matches_either_key() {
        let catalog = memory_catalog().await;
        catalog.insert(submission("Escape Room", 100, "u1")).await.expect("insert");

        // Same caption and size.
        assert!(catalog
            .find_duplicate("Escape Room", 100, "other")
            .await
            .expect("query")
            .is_some());
        // Same transport identity, different caption.
        assert!(catalog
            .find_duplicate("Renamed", 5, "u1")
            .await
            .expect("query")
            .is_some());
        // Same caption, different size and identity.
        assert!(catalog
            .find_duplicate("Escape Room", 101, "other")
            .await
            .expect("query")
            .is_none());
    }
}
