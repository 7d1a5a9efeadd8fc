use taskboard_types::models::{AuditAction, Role};
use tracing::info;
use uuid::Uuid;

use crate::error::InviteError;
use crate::service::InviteService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Unchanged,
    /// Owner had no membership row; one was created.
    Created,
    /// Owner's stored role disagreed with ownership and was rewritten.
    Corrected { from: Role },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub role: Role,
    pub change: MembershipChange,
}

impl InviteService {
    /// Effective role of `user_id` on `board_id`, repairing the owner's row
    /// when it is missing or wrong. Ownership comes from the board row; for
    /// everyone else the stored role stands. Non-members are denied.
    pub async fn ensure_membership(
        &self,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Result<Reconciled, InviteError> {
        self.blocking(move |inner| {
            let (board, user) = (board_id.to_string(), user_id.to_string());
            let owner_id = inner
                .db
                .get_board(&board)?
                .ok_or(InviteError::NotFound("board"))?
                .owner_id;
            let is_owner = owner_id == user;
            let stored = inner.db.get_membership(&board, &user)?;

            let change = match (stored, is_owner) {
                (None, false) => return Err(InviteError::AccessDenied),
                (Some(row), false) => {
                    return Ok(Reconciled {
                        role: row.role()?,
                        change: MembershipChange::Unchanged,
                    });
                }
                (None, true) => MembershipChange::Created,
                (Some(row), true) => match row.role()? {
                    Role::Owner => {
                        return Ok(Reconciled {
                            role: Role::Owner,
                            change: MembershipChange::Unchanged,
                        });
                    }
                    from => MembershipChange::Corrected { from },
                },
            };

            let now = inner.now();
            // The upsert converges under races; a concurrent call that got
            // there first leaves nothing to write.
            if inner.db.upsert_owner_membership(&board, &user, now)? == 0 {
                return Ok(Reconciled {
                    role: Role::Owner,
                    change: MembershipChange::Unchanged,
                });
            }

            let (action, detail) = match change {
                MembershipChange::Corrected { from } => (
                    AuditAction::MembershipRoleCorrected,
                    format!("owner role restored (stored role was {})", from),
                ),
                _ => (
                    AuditAction::MembershipCreated,
                    "owner membership created".to_string(),
                ),
            };
            inner.db.record_audit(&board, None, action, &detail, now)?;
            info!("Board {} membership for owner {}: {}", board_id, user_id, detail);

            Ok(Reconciled {
                role: Role::Owner,
                change,
            })
        })
        .await
    }

    /// Reconcile, then refuse anyone whose effective role is not Owner.
    pub async fn require_owner(&self, board_id: Uuid, user_id: Uuid) -> Result<(), InviteError> {
        let reconciled = self.ensure_membership(board_id, user_id).await?;
        if reconciled.role != Role::Owner {
            return Err(InviteError::AccessDenied);
        }
        Ok(())
    }
}
