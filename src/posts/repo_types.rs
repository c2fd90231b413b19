use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// Post joined with its author's username, for the public listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostWithAuthor {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
}
