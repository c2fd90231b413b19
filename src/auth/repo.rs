use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::User;

/// User persistence as an explicit handle passed into the controller,
/// rather than a module-global connection.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        email_address: &str,
    ) -> anyhow::Result<User>;
    async fn set_reset_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()>;
    /// Single UPDATE so the token cannot survive a password change.
    async fn set_password_and_clear_token(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<()>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email_address, password_reset_token, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email_address, password_reset_token, created_at
            FROM users
            WHERE email_address = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email_address, password_reset_token, created_at
            FROM users
            WHERE password_reset_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        email_address: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, email_address)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, email_address, password_reset_token, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(email_address)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_reset_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_reset_token = $2 WHERE id = $1")
            .bind(user_id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_password_and_clear_token(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, password_reset_token = NULL WHERE id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
