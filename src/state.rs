use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use time::Duration;
use tracing::warn;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::auth::service::AuthService;
use crate::config::AppConfig;
use crate::mailer::{LogMailer, Mailer, SmtpMailer};
use crate::sessions::{InMemorySessionStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub auth: AuthService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::days(
            config.session_ttl_days,
        )));

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                warn!("SMTP not configured; password-reset emails will be logged, not sent");
                Arc::new(LogMailer)
            }
        };

        let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db.clone()));
        let auth = AuthService::new(users, sessions.clone(), mailer, config.public_url.clone());

        Ok(Self {
            db,
            config,
            sessions,
            auth,
        })
    }
}
