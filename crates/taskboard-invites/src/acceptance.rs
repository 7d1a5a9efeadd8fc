use chrono::{DateTime, Utc};
use taskboard_db::Redeem;
use taskboard_types::models::Role;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::InviteError;
use crate::matcher::match_live;
use crate::model::Invite;
use crate::service::InviteService;

/// What a prospective member sees before accepting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitePreview {
    pub board_id: Uuid,
    pub board_title: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

fn require_token(raw_token: &str) -> Result<String, InviteError> {
    let raw = raw_token.trim();
    if raw.is_empty() {
        return Err(InviteError::validation("token is required"));
    }
    Ok(raw.to_string())
}

impl InviteService {
    /// Preview an invite without consuming it.
    pub async fn validate_invite(&self, raw_token: &str) -> Result<InvitePreview, InviteError> {
        let raw = require_token(raw_token)?;
        self.blocking(move |inner| {
            let invite = match_live(inner, &raw, inner.now())?.ok_or(InviteError::InvalidOrExpired)?;
            let board = inner
                .db
                .get_board(&invite.board_id.to_string())?
                .ok_or(InviteError::InvalidOrExpired)?;

            Ok(InvitePreview {
                board_id: invite.board_id,
                board_title: board.title,
                email: invite.email,
                role: invite.role,
                expires_at: invite.expires_at,
            })
        })
        .await
    }

    /// Redeem a raw token for `user_id`. Returns the board joined.
    pub async fn accept_invite(&self, raw_token: &str, user_id: Uuid) -> Result<Uuid, InviteError> {
        let raw = require_token(raw_token)?;
        let invite = self
            .blocking(move |inner| {
                match_live(inner, &raw, inner.now())?.ok_or(InviteError::InvalidOrExpired)
            })
            .await?;

        self.redeem(&invite, user_id).await
    }

    /// Second half of acceptance for an already matched invite: refuse the
    /// board owner and existing members, then insert the membership and consume the invite
    /// in one transaction. Liveness is re-checked inside that transaction.
    pub async fn redeem(&self, invite: &Invite, user_id: Uuid) -> Result<Uuid, InviteError> {
        let board_id = invite.board_id;
        let is_owner = self
            .blocking(move |inner| {
                let board = inner
                    .db
                    .get_board(&board_id.to_string())?
                    .ok_or(InviteError::InvalidOrExpired)?;
                Ok(board.owner_id == user_id.to_string())
            })
            .await?;
        // The owner's role comes from the board row, never from an invite.
        if is_owner {
            self.ensure_membership(board_id, user_id).await?;
            warn!("Owner {} tried to accept invite {} to their own board", user_id, invite.id);
            return Err(InviteError::AlreadyMember);
        }

        let invite = invite.clone();
        self.blocking(move |inner| {
            let (id, board, user) = (
                invite.id.to_string(),
                invite.board_id.to_string(),
                user_id.to_string(),
            );

            if inner.db.get_membership(&board, &user)?.is_some() {
                return Err(InviteError::AlreadyMember);
            }

            match inner.db.redeem_invite(&id, &board, &user, invite.role, inner.now())? {
                Redeem::Accepted => {
                    info!(
                        "Invite {} accepted: user {} joined board {} as {}",
                        invite.id, user_id, invite.board_id, invite.role
                    );
                    Ok(invite.board_id)
                }
                Redeem::AlreadyMember => Err(InviteError::AlreadyMember),
                Redeem::Consumed => {
                    warn!("Invite {} was consumed before user {} could redeem it", invite.id, user_id);
                    Err(InviteError::InvalidOrExpired)
                }
            }
        })
        .await
    }
}
