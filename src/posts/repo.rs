use sqlx::PgPool;
use uuid::Uuid;

use crate::posts::repo_types::{AuthorSummary, Post, PostWithAuthor};

impl Post {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, author_id, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(post)
    }

    pub async fn list_newest_first(db: &PgPool) -> anyhow::Result<Vec<PostWithAuthor>> {
        let rows = sqlx::query_as::<_, PostWithAuthor>(
            r#"
            SELECT p.id, p.title, p.content, p.author_id, p.created_at, u.username
            FROM posts p
            JOIN users u ON u.id = p.author_id
            ORDER BY p.created_at DESC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_by_author(db: &PgPool, author_id: Uuid) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, author_id, created_at
            FROM posts
            WHERE author_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        db: &PgPool,
        title: &str,
        content: &str,
        author_id: Uuid,
    ) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, content, author_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, content, author_id, created_at
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(author_id)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    /// Returns false when no post with this id exists.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        title: &str,
        content: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE posts SET title = $2, content = $3 WHERE id = $1")
            .bind(id)
            .bind(title)
            .bind(content)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

impl AuthorSummary {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<AuthorSummary>> {
        let rows = sqlx::query_as::<_, AuthorSummary>("SELECT id, username FROM users")
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<AuthorSummary>> {
        let row =
            sqlx::query_as::<_, AuthorSummary>("SELECT id, username FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(row)
    }
}
