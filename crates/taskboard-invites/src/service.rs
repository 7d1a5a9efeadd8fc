use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use taskboard_crypto::TokenCodec;
use taskboard_db::Database;
use tracing::error;

use crate::clock::{Clock, SystemClock};
use crate::error::InviteError;
use crate::notifier::Notifier;

#[derive(Debug, Clone)]
pub struct InviteSettings {
    /// Base URL the invite link points at, without a trailing slash.
    pub public_url: String,
    /// How long an invite stays redeemable after issuance (or resend).
    pub ttl: Duration,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:3000".into(),
            ttl: Duration::days(7),
        }
    }
}

impl InviteSettings {
    pub(crate) fn invite_link(&self, raw_secret: &str) -> String {
        format!(
            "{}/invites/accept?token={}",
            self.public_url.trim_end_matches('/'),
            raw_secret
        )
    }
}

#[derive(Clone)]
pub(crate) struct Inner {
    pub db: Arc<Database>,
    pub codec: TokenCodec,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub settings: InviteSettings,
}

impl Inner {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Entry point for invite issuance, matching, acceptance, and membership
/// reconciliation. Cheap to clone; all clones share one store handle.
#[derive(Clone)]
pub struct InviteService {
    pub(crate) inner: Arc<Inner>,
}

impl InviteService {
    pub fn new(
        db: Arc<Database>,
        codec: TokenCodec,
        notifier: Arc<dyn Notifier>,
        settings: InviteSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                codec,
                notifier,
                clock: Arc::new(SystemClock),
                settings,
            }),
        }
    }

    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let inner = Inner {
            clock,
            ..(*self.inner).clone()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.inner.db
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.now()
    }

    /// Run SQL and Argon2 work off the async runtime.
    pub(crate) async fn blocking<F, T>(&self, f: F) -> Result<T, InviteError>
    where
        F: FnOnce(&Inner) -> Result<T, InviteError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                InviteError::Storage(anyhow!("blocking task failed: {}", e))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_link_carries_token_as_query_parameter() {
        let settings = InviteSettings {
            public_url: "https://boards.example.com/".into(),
            ..InviteSettings::default()
        };
        assert_eq!(
            settings.invite_link("ab12"),
            "https://boards.example.com/invites/accept?token=ab12"
        );
    }

    #[test]
    fn default_ttl_is_one_week() {
        assert_eq!(InviteSettings::default().ttl, Duration::days(7));
    }
}
