use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::UserSnapshot;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for account creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: String,
    pub email_address: String,
}

/// Request body for requesting a password-reset email.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email_address: String,
}

/// Request body for redeeming a reset token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordRequest {
    pub reset_token: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
}

impl From<UserSnapshot> for PublicUser {
    fn from(user: UserSnapshot) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStatusResponse {
    pub is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

/// The uniform body shape every outcome is reported in. All endpoints
/// answer 200; success and failure only differ in which fields are set.
#[derive(Debug, Serialize)]
pub struct Outcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: None,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: None,
            message: None,
            error: Some(message.into()),
        }
    }
}
