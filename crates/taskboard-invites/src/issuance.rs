use chrono::{DateTime, Utc};
use taskboard_db::InsertInvite;
use taskboard_db::queries::NewInvite;
use taskboard_types::models::Role;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::InviteError;
use crate::model::Invite;
use crate::notifier::Email;
use crate::service::InviteService;

/// Whether the invite email went out. A failed delivery leaves the invite
/// stored; `resend_invite` retries without creating a second record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed(String),
}

/// What the issuing owner gets back. The raw token is not part of it; it
/// only travels inside the email.
#[derive(Debug, Clone)]
pub struct IssuedInvite {
    pub invite_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub delivery: Delivery,
}

struct Stored {
    invite_id: Uuid,
    email: String,
    role: Role,
    board_title: String,
    raw_secret: String,
    expires_at: DateTime<Utc>,
}

impl InviteService {
    /// Issue an invite for `email` on `board_id`. Callers must already have
    /// checked that `invited_by` owns the board.
    pub async fn create_invite(
        &self,
        board_id: Uuid,
        email: &str,
        role: Option<Role>,
        invited_by: Uuid,
    ) -> Result<IssuedInvite, InviteError> {
        let email = email.trim().to_string();
        if email.is_empty() {
            return Err(InviteError::validation("email is required"));
        }
        let role = role.unwrap_or_default();
        if role == Role::Owner {
            return Err(InviteError::validation(
                "the Owner role comes from board ownership and cannot be granted by invite",
            ));
        }

        let stored = self
            .blocking(move |inner| {
                let token = inner.codec.issue()?;
                let now = inner.now();
                let invite_id = Uuid::new_v4();
                let expires_at = now + inner.settings.ttl;

                let (id, board, actor) = (
                    invite_id.to_string(),
                    board_id.to_string(),
                    invited_by.to_string(),
                );
                let outcome = inner.db.insert_invite(&NewInvite {
                    id: &id,
                    board_id: &board,
                    email: &email,
                    role,
                    token_hash: &token.hash,
                    invited_by: Some(&actor),
                    created_at: now,
                    expires_at,
                })?;
                if outcome == InsertInvite::BoardMissing {
                    return Err(InviteError::NotFound("board"));
                }

                let board_title = inner
                    .db
                    .get_board(&board)?
                    .map(|b| b.title)
                    .unwrap_or_default();

                Ok(Stored {
                    invite_id,
                    email,
                    role,
                    board_title,
                    raw_secret: token.raw_secret,
                    expires_at,
                })
            })
            .await?;

        info!(
            "Invite {} created on board {} with role {}",
            stored.invite_id, board_id, stored.role
        );

        let delivery = self.deliver(&stored).await;
        Ok(IssuedInvite {
            invite_id: stored.invite_id,
            expires_at: stored.expires_at,
            delivery,
        })
    }

    /// Rotate the token of a pending invite, push its expiry out by a full
    /// TTL, and email the new link. The previous link stops matching.
    pub async fn resend_invite(
        &self,
        board_id: Uuid,
        invite_id: Uuid,
        actor: Uuid,
    ) -> Result<IssuedInvite, InviteError> {
        let stored = self
            .blocking(move |inner| {
                let (id, board) = (invite_id.to_string(), board_id.to_string());
                let invite = load_board_invite(inner.db.as_ref(), &board, &id)?;
                if invite.used {
                    return Err(InviteError::validation("invite has already been used"));
                }
                if invite.cancelled {
                    return Err(InviteError::validation("invite has been cancelled"));
                }

                let token = inner.codec.issue()?;
                let now = inner.now();
                let expires_at = now + inner.settings.ttl;
                let changed = inner.db.rotate_invite_token(
                    &board,
                    &id,
                    &token.hash,
                    expires_at,
                    &actor.to_string(),
                    now,
                )?;
                if changed == 0 {
                    return Err(InviteError::validation("invite is no longer pending"));
                }

                let board_title = inner
                    .db
                    .get_board(&board)?
                    .map(|b| b.title)
                    .unwrap_or_default();

                Ok(Stored {
                    invite_id,
                    email: invite.email,
                    role: invite.role,
                    board_title,
                    raw_secret: token.raw_secret,
                    expires_at,
                })
            })
            .await?;

        info!("Invite {} re-issued on board {}", invite_id, board_id);

        let delivery = self.deliver(&stored).await;
        Ok(IssuedInvite {
            invite_id,
            expires_at: stored.expires_at,
            delivery,
        })
    }

    /// Soft-revoke an unused invite. Cancelling an already cancelled invite
    /// succeeds without writing anything.
    pub async fn cancel_invite(
        &self,
        board_id: Uuid,
        invite_id: Uuid,
        actor: Uuid,
    ) -> Result<(), InviteError> {
        self.blocking(move |inner| {
            let (id, board) = (invite_id.to_string(), board_id.to_string());
            let changed = inner
                .db
                .cancel_invite(&board, &id, &actor.to_string(), inner.now())?;
            if changed > 0 {
                info!("Invite {} cancelled on board {}", invite_id, board_id);
                return Ok(());
            }

            let invite = load_board_invite(inner.db.as_ref(), &board, &id)?;
            if invite.used {
                return Err(InviteError::validation("invite has already been used"));
            }
            Ok(())
        })
        .await
    }

    /// Every invite of the board, newest first.
    pub async fn list_invites(&self, board_id: Uuid) -> Result<Vec<Invite>, InviteError> {
        self.blocking(move |inner| {
            let rows = inner.db.list_invites_for_board(&board_id.to_string())?;
            let invites = rows
                .iter()
                .map(Invite::try_from)
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(invites)
        })
        .await
    }

    async fn deliver(&self, stored: &Stored) -> Delivery {
        let link = self.inner.settings.invite_link(&stored.raw_secret);
        let email = Email {
            to: stored.email.clone(),
            subject: format!("You're invited to \"{}\"", stored.board_title),
            text: format!(
                "You have been invited to join the board \"{}\" as {}.\n\n\
                 Accept the invite: {}\n\n\
                 This link can be used once and expires on {} UTC.\n",
                stored.board_title,
                stored.role,
                link,
                stored.expires_at.format("%Y-%m-%d %H:%M"),
            ),
        };

        match self.inner.notifier.send(&email).await {
            Ok(()) => {
                info!("Invite {} emailed", stored.invite_id);
                Delivery::Sent
            }
            Err(e) => {
                warn!("Invite {} stored but not delivered: {}", stored.invite_id, e);
                Delivery::Failed(e.to_string())
            }
        }
    }
}

/// Invite by id, scoped to a board. An invite of another board is reported
/// as missing.
fn load_board_invite(
    db: &taskboard_db::Database,
    board_id: &str,
    invite_id: &str,
) -> Result<Invite, InviteError> {
    let row = db
        .get_invite(invite_id)?
        .filter(|row| row.board_id == board_id)
        .ok_or(InviteError::NotFound("invite"))?;
    Ok(Invite::try_from(&row)?)
}
