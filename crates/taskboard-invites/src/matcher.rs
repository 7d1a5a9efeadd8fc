use chrono::{DateTime, Utc};
use taskboard_crypto::TokenCodec;
use tracing::debug;

use crate::error::InviteError;
use crate::model::Invite;
use crate::service::{Inner, InviteService};

impl InviteService {
    /// Locate the live invite a raw token was issued for, if any. Read-only.
    pub async fn find_live_invite_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<Invite>, InviteError> {
        let raw = raw_token.trim().to_string();
        self.blocking(move |inner| match_live(inner, &raw, inner.now()))
            .await
    }
}

/// Stored hashes are one-way, so there is no index from token to row: every
/// live invite is verified in `created_at` order and the first hit wins.
pub(crate) fn match_live(
    inner: &Inner,
    raw: &str,
    now: DateTime<Utc>,
) -> Result<Option<Invite>, InviteError> {
    if !TokenCodec::is_well_formed(raw) {
        return Ok(None);
    }

    let candidates = inner.db.list_live_invites(now)?;
    let matched = candidates
        .iter()
        .find(|row| inner.codec.verify(raw, &row.token_hash));
    debug!(
        "Token scan over {} live invites: {}",
        candidates.len(),
        if matched.is_some() { "match" } else { "no match" }
    );

    Ok(matched.map(Invite::try_from).transpose()?)
}
