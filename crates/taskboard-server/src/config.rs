use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;
use taskboard_invites::InviteSettings;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const MAX_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub public_url: String,
    pub invite_ttl_days: i64,
    /// None when outbound email is not configured.
    pub email: Option<EmailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("TASKBOARD_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TASKBOARD_JWT_SECRET is unset or still a placeholder");
        }

        let port = match get("TASKBOARD_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("TASKBOARD_PORT is not a port number: {raw}"))?,
            None => 3000,
        };

        let invite_ttl_days = match get("TASKBOARD_INVITE_TTL_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .with_context(|| format!("TASKBOARD_INVITE_TTL_DAYS is not a number: {raw}"))?,
            None => 7,
        };
        if !(1..=MAX_TTL_DAYS).contains(&invite_ttl_days) {
            bail!("TASKBOARD_INVITE_TTL_DAYS must be between 1 and {MAX_TTL_DAYS}");
        }

        let email = match (
            get("TASKBOARD_EMAIL_API_URL"),
            get("TASKBOARD_EMAIL_API_KEY"),
            get("TASKBOARD_EMAIL_SENDER"),
        ) {
            (Some(api_url), Some(api_key), Some(sender)) => Some(EmailConfig {
                api_url,
                api_key,
                sender,
                sender_name: get("TASKBOARD_EMAIL_SENDER_NAME"),
            }),
            (None, None, None) => None,
            _ => bail!(
                "TASKBOARD_EMAIL_API_URL, TASKBOARD_EMAIL_API_KEY and \
                 TASKBOARD_EMAIL_SENDER must be set together"
            ),
        };

        Ok(Self {
            host: get("TASKBOARD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("TASKBOARD_DB_PATH")
                .unwrap_or_else(|| "taskboard.db".into())
                .into(),
            jwt_secret,
            public_url: get("TASKBOARD_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            invite_ttl_days,
            email,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address {addr}"))
    }

    pub fn invite_settings(&self) -> InviteSettings {
        InviteSettings {
            public_url: self.public_url.clone(),
            ttl: Duration::days(self.invite_ttl_days),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const SECRET: (&str, &str) = ("TASKBOARD_JWT_SECRET", "a-real-secret-for-tests");

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = parse(&[SECRET]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("taskboard.db"));
        assert_eq!(config.public_url, "http://localhost:3000");
        assert_eq!(config.invite_ttl_days, 7);
        assert!(config.email.is_none());
        assert_eq!(config.invite_settings().ttl, Duration::days(7));
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn missing_or_placeholder_secret_is_fatal() {
        assert!(parse(&[]).is_err());
        assert!(parse(&[("TASKBOARD_JWT_SECRET", "  ")]).is_err());
        assert!(parse(&[("TASKBOARD_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn ttl_must_be_a_positive_day_count() {
        assert!(parse(&[SECRET, ("TASKBOARD_INVITE_TTL_DAYS", "0")]).is_err());
        assert!(parse(&[SECRET, ("TASKBOARD_INVITE_TTL_DAYS", "soon")]).is_err());
        assert!(parse(&[SECRET, ("TASKBOARD_INVITE_TTL_DAYS", "100000")]).is_err());
        let config = parse(&[SECRET, ("TASKBOARD_INVITE_TTL_DAYS", "14")]).unwrap();
        assert_eq!(config.invite_settings().ttl, Duration::days(14));
    }

    #[test]
    fn public_url_loses_trailing_slash() {
        let config = parse(&[SECRET, ("TASKBOARD_PUBLIC_URL", "https://boards.example.com/")])
            .unwrap();
        assert_eq!(config.public_url, "https://boards.example.com");
    }

    #[test]
    fn email_settings_are_all_or_nothing() {
        let config = parse(&[
            SECRET,
            ("TASKBOARD_EMAIL_API_URL", "https://mail.example.com/send"),
            ("TASKBOARD_EMAIL_API_KEY", "key"),
            ("TASKBOARD_EMAIL_SENDER", "boards@example.com"),
        ])
        .unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.sender, "boards@example.com");
        assert_eq!(email.sender_name, None);

        assert!(parse(&[SECRET, ("TASKBOARD_EMAIL_API_KEY", "key")]).is_err());
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(parse(&[SECRET, ("TASKBOARD_PORT", "70000")]).is_err());
    }
}
