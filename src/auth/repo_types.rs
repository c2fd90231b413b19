use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_address: Option<String>,
    /// Live reset token, if one has been issued and not yet redeemed.
    /// At most one per user; re-requesting a reset replaces it.
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Copy of the user fields kept in the session at login time.
/// Deliberately a snapshot: editing the user row later does not refresh it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: Uuid,
    pub username: String,
    pub email_address: Option<String>,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email_address: user.email_address.clone(),
        }
    }
}
