use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::UserSnapshot;
use crate::auth::token::generate_reset_token;
use crate::mailer::Mailer;
use crate::sessions::SessionStore;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("username not found")]
    UserNotFound,
    #[error("no good.  Found user, but password does not match!")]
    InvalidCredentials,
    #[error("no account found for that email address")]
    AccountNotFound,
    #[error("invalid reset token")]
    InvalidToken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// What the client sees in the body-level `error` field. Internal
    /// failures are logged at the call site and kept generic here.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Internal(_) => "something went wrong, please try again".into(),
            other => other.to_string(),
        }
    }
}

/// The auth/reset controller. Holds explicit handles to its collaborators;
/// never touches cookies or HTTP.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    mailer: Arc<dyn Mailer>,
    public_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        mailer: Arc<dyn Mailer>,
        public_url: String,
    ) -> Self {
        Self {
            users,
            sessions,
            mailer,
            public_url,
        }
    }

    /// Username match is exact, case-sensitive as stored.
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        email_address: &str,
    ) -> Result<UserSnapshot, AuthError> {
        if self.users.find_by_username(username).await?.is_some() {
            warn!(%username, "create_account duplicate username");
            return Err(AuthError::DuplicateUsername);
        }
        let hash = hash_password(password)?;
        let user = self.users.create(username, &hash, email_address).await?;
        info!(user_id = %user.id, %username, "account created");
        Ok(UserSnapshot::from(&user))
    }

    /// On success, establishes a fresh session holding a snapshot of the
    /// user and returns its id for the cookie.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Uuid, UserSnapshot), AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let snapshot = UserSnapshot::from(&user);
        let session_id = Uuid::new_v4();
        self.sessions.set(session_id, snapshot.clone()).await;
        info!(user_id = %user.id, %username, "user logged in");
        Ok((session_id, snapshot))
    }

    /// Pure read; expired or unknown sessions read as logged out.
    pub async fn login_status(&self, session_id: Option<Uuid>) -> Option<UserSnapshot> {
        match session_id {
            Some(id) => self.sessions.get(id).await,
            None => None,
        }
    }

    /// Idempotent: destroying an absent session is not an error.
    pub async fn logout(&self, session_id: Option<Uuid>) {
        if let Some(id) = session_id {
            self.sessions.destroy(id).await;
        }
    }

    /// Issues a fresh token, replacing any previous one: only the newest
    /// issued token is ever valid. Email delivery failure is logged and
    /// swallowed; the caller still sees success.
    pub async fn request_password_reset(&self, email_address: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_email(email_address)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let token = generate_reset_token();
        self.users.set_reset_token(user.id, &token).await?;
        info!(user_id = %user.id, "password reset token issued");

        let link = format!(
            "{}/set-password/{}",
            self.public_url.trim_end_matches('/'),
            token
        );
        let html = format!(
            "<p>Someone (hopefully you) asked to reset your password.</p>\
             <p><a href=\"{link}\">Click here to choose a new one.</a></p>\
             <p>If this wasn't you, you can ignore this email.</p>"
        );
        if let Err(e) = self
            .mailer
            .send(email_address, "Reset your password", html)
            .await
        {
            error!(error = %e, user_id = %user.id, "reset email delivery failed");
        }
        Ok(())
    }

    /// Exact-match lookup; the token is cleared in the same update that
    /// writes the new hash, so it cannot be redeemed twice.
    pub async fn redeem_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let hash = hash_password(new_password)?;
        self.users.set_password_and_clear_token(user.id, &hash).await?;
        info!(user_id = %user.id, "password reset redeemed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::User;
    use axum::async_trait;
    use std::collections::HashMap;
    use time::{Duration, OffsetDateTime};
    use tokio::sync::{Mutex, RwLock};

    use crate::sessions::InMemorySessionStore;

    struct MemoryUserStore {
        rows: RwLock<HashMap<Uuid, User>>,
    }

    impl MemoryUserStore {
        fn new() -> Self {
            Self {
                rows: RwLock::new(HashMap::new()),
            }
        }

        async fn reset_token_of(&self, username: &str) -> Option<String> {
            self.rows
                .read()
                .await
                .values()
                .find(|u| u.username == username)
                .and_then(|u| u.password_reset_token.clone())
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .rows
                .read()
                .await
                .values()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .rows
                .read()
                .await
                .values()
                .find(|u| u.email_address.as_deref() == Some(email))
                .cloned())
        }

        async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .rows
                .read()
                .await
                .values()
                .find(|u| u.password_reset_token.as_deref() == Some(token))
                .cloned())
        }

        async fn create(
            &self,
            username: &str,
            password_hash: &str,
            email_address: &str,
        ) -> anyhow::Result<User> {
            let user = User {
                id: Uuid::new_v4(),
                username: username.into(),
                password_hash: password_hash.into(),
                email_address: Some(email_address.into()),
                password_reset_token: None,
                created_at: OffsetDateTime::now_utc(),
            };
            self.rows.write().await.insert(user.id, user.clone());
            Ok(user)
        }

        async fn set_reset_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
            if let Some(u) = self.rows.write().await.get_mut(&user_id) {
                u.password_reset_token = Some(token.into());
            }
            Ok(())
        }

        async fn set_password_and_clear_token(
            &self,
            user_id: Uuid,
            password_hash: &str,
        ) -> anyhow::Result<()> {
            if let Some(u) = self.rows.write().await.get_mut(&user_id) {
                u.password_hash = password_hash.into();
                u.password_reset_token = None;
            }
            Ok(())
        }
    }

    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn new(fail: bool) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html: String) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp unreachable");
            }
            self.sent.lock().await.push((to.into(), subject.into()));
            Ok(())
        }
    }

    struct Harness {
        service: AuthService,
        users: Arc<MemoryUserStore>,
        mailer: Arc<RecordingMailer>,
    }

    fn harness_with_mailer(fail_mail: bool) -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let sessions = Arc::new(InMemorySessionStore::new(Duration::days(30)));
        let mailer = Arc::new(RecordingMailer::new(fail_mail));
        let service = AuthService::new(
            users.clone(),
            sessions,
            mailer.clone(),
            "http://localhost:3000".into(),
        );
        Harness {
            service,
            users,
            mailer,
        }
    }

    fn harness() -> Harness {
        harness_with_mailer(false)
    }

    #[tokio::test]
    async fn create_then_login_establishes_session() {
        let h = harness();
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");

        let (session_id, user) = h.service.login("alice", "pw1").await.expect("login");
        assert_eq!(user.username, "alice");

        let status = h.service.login_status(Some(session_id)).await;
        assert_eq!(status.map(|u| u.username), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let h = harness();
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");
        let err = h
            .service
            .create_account("alice", "other", "b@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials_not_user_not_found() {
        let h = harness();
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");
        let err = h.service.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unknown_username_is_user_not_found() {
        let h = harness();
        let err = h.service.login("nobody", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_status_reads_false() {
        let h = harness();
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");
        let (session_id, _) = h.service.login("alice", "pw1").await.expect("login");

        h.service.logout(Some(session_id)).await;
        assert!(h.service.login_status(Some(session_id)).await.is_none());

        // Destroying again, or with no cookie at all, is fine.
        h.service.logout(Some(session_id)).await;
        h.service.logout(None).await;
        assert!(h.service.login_status(None).await.is_none());
    }

    #[tokio::test]
    async fn reset_request_for_unknown_email_is_account_not_found() {
        let h = harness();
        let err = h
            .service
            .request_password_reset("ghost@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountNotFound));
        assert!(h.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn second_reset_request_invalidates_first_token() {
        let h = harness();
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");

        h.service
            .request_password_reset("a@x.com")
            .await
            .expect("first reset request");
        let t1 = h.users.reset_token_of("alice").await.expect("token issued");

        h.service
            .request_password_reset("a@x.com")
            .await
            .expect("second reset request");
        let t2 = h.users.reset_token_of("alice").await.expect("token issued");
        assert_ne!(t1, t2);

        let err = h
            .service
            .redeem_password_reset(&t1, "pw2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        h.service
            .redeem_password_reset(&t2, "pw2")
            .await
            .expect("newest token redeems");
    }

    #[tokio::test]
    async fn redemption_is_single_use() {
        let h = harness();
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");
        h.service
            .request_password_reset("a@x.com")
            .await
            .expect("reset request");
        let token = h.users.reset_token_of("alice").await.expect("token issued");

        h.service
            .redeem_password_reset(&token, "pw2")
            .await
            .expect("first redemption");
        let err = h
            .service
            .redeem_password_reset(&token, "pw3")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn mailer_failure_is_swallowed_and_token_still_issued() {
        let h = harness_with_mailer(true);
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");

        h.service
            .request_password_reset("a@x.com")
            .await
            .expect("reset request reports success despite smtp failure");
        let token = h.users.reset_token_of("alice").await.expect("token issued");
        h.service
            .redeem_password_reset(&token, "pw2")
            .await
            .expect("token redeems");
    }

    #[tokio::test]
    async fn full_reset_scenario() {
        let h = harness();
        h.service
            .create_account("alice", "pw1", "a@x.com")
            .await
            .expect("create account");

        let (session_id, _) = h.service.login("alice", "pw1").await.expect("login");
        assert!(h.service.login_status(Some(session_id)).await.is_some());
        assert!(matches!(
            h.service.login("alice", "wrong").await.unwrap_err(),
            AuthError::InvalidCredentials
        ));

        h.service
            .request_password_reset("a@x.com")
            .await
            .expect("first request");
        let t1 = h.users.reset_token_of("alice").await.expect("t1");
        h.service
            .request_password_reset("a@x.com")
            .await
            .expect("second request");
        let t2 = h.users.reset_token_of("alice").await.expect("t2");

        assert!(matches!(
            h.service.redeem_password_reset(&t1, "pw2").await.unwrap_err(),
            AuthError::InvalidToken
        ));
        h.service
            .redeem_password_reset(&t2, "pw2")
            .await
            .expect("t2 redeems");

        assert!(matches!(
            h.service.login("alice", "pw1").await.unwrap_err(),
            AuthError::InvalidCredentials
        ));
        h.service
            .login("alice", "pw2")
            .await
            .expect("login with new password");

        let sent = h.mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "a@x.com");
    }
}
