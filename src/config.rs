use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Base URL of the frontend, used to build password-reset links.
    pub public_url: String,
    pub session_ttl_days: i64,
    /// When absent, outbound mail is logged instead of sent.
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let public_url =
            std::env::var("PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let session_ttl_days = std::env::var("SESSION_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(30);

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "blog <no-reply@localhost>".into()),
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            public_url,
            session_ttl_days,
            smtp,
        })
    }
}
