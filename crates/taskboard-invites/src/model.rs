use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use taskboard_db::models::{InviteRow, parse_ts};
use taskboard_types::api::InviteSummary;
use taskboard_types::models::Role;
use uuid::Uuid;

/// An invite as seen above the storage layer. The token hash stays behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub id: Uuid,
    pub board_id: Uuid,
    pub email: String,
    pub role: Role,
    pub used: bool,
    pub cancelled: bool,
    pub invited_by: Option<Uuid>,
    pub accepted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    /// Matchable right now: unused, not cancelled, not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.cancelled && self.expires_at > now
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse::<Uuid>()
        .with_context(|| format!("Corrupt id '{}'", raw))
}

impl TryFrom<&InviteRow> for Invite {
    type Error = anyhow::Error;

    fn try_from(row: &InviteRow) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.id)?,
            board_id: parse_id(&row.board_id)?,
            email: row.email.clone(),
            role: row.role()?,
            used: row.used,
            cancelled: row.cancelled,
            invited_by: row.invited_by.as_deref().map(parse_id).transpose()?,
            accepted_by: row.accepted_by.as_deref().map(parse_id).transpose()?,
            created_at: parse_ts(&row.created_at)?,
            expires_at: parse_ts(&row.expires_at)?,
        })
    }
}

impl From<&Invite> for InviteSummary {
    fn from(invite: &Invite) -> Self {
        Self {
            id: invite.id,
            email: invite.email.clone(),
            role: invite.role,
            used: invite.used,
            cancelled: invite.cancelled,
            created_at: invite.created_at,
            expires_at: invite.expires_at,
        }
    }
}
