use std::collections::HashMap;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    Json,
};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::dto::Outcome;
use crate::auth::repo_types::UserSnapshot;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sid";

/// Server-side session store, keyed by the opaque id carried in the cookie.
/// The auth controller only ever sees this interface; cookie mechanics live
/// in the extractors and handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<UserSnapshot>;
    async fn set(&self, id: Uuid, user: UserSnapshot);
    async fn destroy(&self, id: Uuid);
}

struct Entry {
    user: UserSnapshot,
    expires_at: OffsetDateTime,
}

/// In-process session map with a fixed TTL. Sessions are not renewed on
/// activity; expired entries are dropped lazily on lookup.
pub struct InMemorySessionStore {
    ttl: Duration,
    inner: RwLock<HashMap<Uuid, Entry>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: Uuid) -> Option<UserSnapshot> {
        let now = OffsetDateTime::now_utc();
        {
            let map = self.inner.read().await;
            match map.get(&id) {
                None => return None,
                Some(entry) if entry.expires_at > now => return Some(entry.user.clone()),
                Some(_) => {}
            }
        }
        // Expired: evict under the write lock.
        self.inner.write().await.remove(&id);
        None
    }

    async fn set(&self, id: Uuid, user: UserSnapshot) {
        let entry = Entry {
            user,
            expires_at: OffsetDateTime::now_utc() + self.ttl,
        };
        self.inner.write().await.insert(id, entry);
    }

    async fn destroy(&self, id: Uuid) {
        self.inner.write().await.remove(&id);
    }
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

pub fn session_cookie(id: Uuid, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// The session id from the request cookie, if any. Never rejects.
pub struct SessionId(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionId(session_id_from_headers(&parts.headers)))
    }
}

/// Resolves the cookie against the session store; the gate in front of
/// every mutating post route. Rejection is body-level, HTTP 200, matching
/// the rest of the API's error contract.
pub struct CurrentUser(pub UserSnapshot);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Json<Outcome>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let forbidden = || Json(Outcome::error("No signed-in User. Posting forbidden."));
        let id = session_id_from_headers(&parts.headers).ok_or_else(forbidden)?;
        let user = state.sessions.get(id).await.ok_or_else(forbidden)?;
        Ok(CurrentUser(user))
    }
}
