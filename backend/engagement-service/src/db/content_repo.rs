use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::ContentItem;

/// Read access to the content registry projection.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find(&self, content_type: &str, content_id: Uuid) -> Result<Option<ContentItem>>;

    async fn exists(&self, content_type: &str, content_id: Uuid) -> Result<bool>;
}

/// Read-only access to the content registry projection.
///
/// Content documents are owned by the content module; this subsystem only
/// consults the projection for existence checks and per-content view
/// thresholds.
#[derive(Clone)]
pub struct ContentRepository {
    pool: PgPool,
}

impl ContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for ContentRepository {
    async fn find(&self, content_type: &str, content_id: Uuid) -> Result<Option<ContentItem>> {
        let item = sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT content_type, content_id, owner_id, view_threshold_secs
            FROM content_items
            WHERE content_type = $1 AND content_id = $2
            "#,
        )
        .bind(content_type)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn exists(&self, content_type: &str, content_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM content_items
                WHERE content_type = $1 AND content_id = $2
            )
            "#,
        )
        .bind(content_type)
        .bind(content_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
