use crate::Database;
use crate::models::{
    AuditRow, BoardRow, InviteRow, MemberRow, MembershipRow, UserRow, format_ts,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, ffi, params};
use taskboard_types::models::{AuditAction, Role};
use uuid::Uuid;

/// Result of inserting an invite row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertInvite {
    Inserted,
    /// The referenced board does not exist (foreign key rejected the row).
    BoardMissing,
}

/// Result of the accept transaction (membership insert + mark used).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redeem {
    Accepted,
    /// `(board_id, user_id)` already exists. Nothing was written.
    AlreadyMember,
    /// The invite stopped being live before the transaction ran. Nothing
    /// was written.
    Consumed,
}

/// Values for a new invite row. `used` and `cancelled` start false.
pub struct NewInvite<'a> {
    pub id: &'a str,
    pub board_id: &'a str,
    pub email: &'a str,
    pub role: Role,
    pub token_hash: &'a str,
    pub invited_by: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

enum Constraint {
    Unique,
    ForeignKey,
}

fn constraint_violation(err: &rusqlite::Error) -> Option<Constraint> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(Constraint::Unique)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Constraint::ForeignKey),
                _ => None,
            }
        }
        _ => None,
    }
}

const INVITE_COLUMNS: &str = "id, board_id, email, role, token_hash, used, cancelled, \
     invited_by, accepted_by, created_at, expires_at, used_at";

fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<InviteRow> {
    Ok(InviteRow {
        id: row.get(0)?,
        board_id: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        token_hash: row.get(4)?,
        used: row.get(5)?,
        cancelled: row.get(6)?,
        invited_by: row.get(7)?,
        accepted_by: row.get(8)?,
        created_at: row.get(9)?,
        expires_at: row.get(10)?,
        used_at: row.get(11)?,
    })
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<BoardRow> {
    Ok(BoardRow {
        id: row.get(0)?,
        title: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn insert_audit(
    conn: &Connection,
    board_id: &str,
    actor_id: Option<&str>,
    action: AuditAction,
    detail: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_events (id, board_id, actor_id, action, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            board_id,
            actor_id,
            action.as_str(),
            detail,
            format_ts(now)
        ],
    )?;
    Ok(())
}

impl Database {
    // -- Users --

    /// Returns false if the username is already taken.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, username, password_hash, format_ts(now)],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if matches!(constraint_violation(&e), Some(Constraint::Unique)) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Boards --

    /// Insert a board together with its owner's membership row.
    pub fn create_board(
        &self,
        id: &str,
        title: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO boards (id, title, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, title, owner_id, format_ts(now)],
            )?;
            tx.execute(
                "INSERT INTO board_members (board_id, user_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, owner_id, Role::Owner.as_str(), format_ts(now)],
            )?;
            insert_audit(&tx, id, Some(owner_id), AuditAction::BoardCreated, title, now)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_board(&self, id: &str) -> Result<Option<BoardRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, owner_id, created_at FROM boards WHERE id = ?1",
                    [id],
                    board_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Boards the user belongs to or owns, with the stored role (None when
    /// an owner's membership row is missing).
    pub fn list_boards_for_user(&self, user_id: &str) -> Result<Vec<(BoardRow, Option<String>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.id, b.title, b.owner_id, b.created_at, m.role
                 FROM boards b
                 LEFT JOIN board_members m ON m.board_id = b.id AND m.user_id = ?1
                 WHERE m.user_id IS NOT NULL OR b.owner_id = ?1
                 ORDER BY b.created_at DESC, b.id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| Ok((board_from_row(row)?, row.get(4)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Memberships --

    pub fn get_membership(&self, board_id: &str, user_id: &str) -> Result<Option<MembershipRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT board_id, user_id, role, created_at FROM board_members
                     WHERE board_id = ?1 AND user_id = ?2",
                    [board_id, user_id],
                    |row| {
                        Ok(MembershipRow {
                            board_id: row.get(0)?,
                            user_id: row.get(1)?,
                            role: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_members(&self, board_id: &str) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.user_id, u.username, m.role, m.created_at
                 FROM board_members m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.board_id = ?1
                 ORDER BY m.created_at, m.user_id",
            )?;
            let rows = stmt
                .query_map([board_id], |row| {
                    Ok(MemberRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        role: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Create the owner's membership row, or correct its role to Owner.
    /// Returns the number of rows written: 0 when the row was already right.
    pub fn upsert_owner_membership(
        &self,
        board_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT INTO board_members (board_id, user_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (board_id, user_id)
                 DO UPDATE SET role = excluded.role WHERE board_members.role <> excluded.role",
                params![board_id, user_id, Role::Owner.as_str(), format_ts(now)],
            )?;
            Ok(changed)
        })
    }

    // -- Invites --

    /// Insert an invite and its audit entry. The board reference is checked
    /// by the foreign key, not by a prior lookup.
    pub fn insert_invite(&self, invite: &NewInvite<'_>) -> Result<InsertInvite> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let inserted = tx.execute(
                "INSERT INTO invites (id, board_id, email, role, token_hash, invited_by, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    invite.id,
                    invite.board_id,
                    invite.email,
                    invite.role.as_str(),
                    invite.token_hash,
                    invite.invited_by,
                    format_ts(invite.created_at),
                    format_ts(invite.expires_at),
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if matches!(constraint_violation(&e), Some(Constraint::ForeignKey)) => {
                    return Ok(InsertInvite::BoardMissing);
                }
                Err(e) => return Err(e.into()),
            }

            let detail = format!("invite {} for {} as {}", invite.id, invite.email, invite.role);
            insert_audit(
                &tx,
                invite.board_id,
                invite.invited_by,
                AuditAction::InviteCreated,
                &detail,
                invite.created_at,
            )?;
            tx.commit()?;
            Ok(InsertInvite::Inserted)
        })
    }

    /// Unused, uncancelled invites with `expires_at > now`, oldest first.
    pub fn list_live_invites(&self, now: DateTime<Utc>) -> Result<Vec<InviteRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {INVITE_COLUMNS} FROM invites
                 WHERE used = 0 AND cancelled = 0 AND expires_at > ?1
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([format_ts(now)], invite_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_invite(&self, id: &str) -> Result<Option<InviteRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {INVITE_COLUMNS} FROM invites WHERE id = ?1");
            let row = conn.query_row(&sql, [id], invite_from_row).optional()?;
            Ok(row)
        })
    }

    /// Every invite of a board, newest first.
    pub fn list_invites_for_board(&self, board_id: &str) -> Result<Vec<InviteRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {INVITE_COLUMNS} FROM invites WHERE board_id = ?1
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([board_id], invite_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flag a pending invite as cancelled. Returns rows touched (0 if the
    /// invite is unknown, belongs to another board, was used, or was already
    /// cancelled).
    pub fn cancel_invite(
        &self,
        board_id: &str,
        invite_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "UPDATE invites SET cancelled = 1
                 WHERE id = ?1 AND board_id = ?2 AND used = 0 AND cancelled = 0",
                [invite_id, board_id],
            )?;
            if changed > 0 {
                insert_audit(
                    &tx,
                    board_id,
                    Some(actor_id),
                    AuditAction::InviteCancelled,
                    invite_id,
                    now,
                )?;
            }
            tx.commit()?;
            Ok(changed)
        })
    }

    /// Replace the token hash and expiry of a pending invite. Returns rows
    /// touched (0 unless the invite is unused and not cancelled).
    pub fn rotate_invite_token(
        &self,
        board_id: &str,
        invite_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "UPDATE invites SET token_hash = ?3, expires_at = ?4
                 WHERE id = ?1 AND board_id = ?2 AND used = 0 AND cancelled = 0",
                params![invite_id, board_id, token_hash, format_ts(expires_at)],
            )?;
            if changed > 0 {
                insert_audit(&tx, board_id, Some(actor_id), AuditAction::InviteResent, invite_id, now)?;
            }
            tx.commit()?;
            Ok(changed)
        })
    }

    /// Insert the membership granted by an invite and mark the invite used,
    /// as one transaction. The `(board_id, user_id)` key is the race backstop.
    pub fn redeem_invite(
        &self,
        invite_id: &str,
        board_id: &str,
        user_id: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Redeem> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let inserted = tx.execute(
                "INSERT INTO board_members (board_id, user_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![board_id, user_id, role.as_str(), format_ts(now)],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if matches!(constraint_violation(&e), Some(Constraint::Unique)) => {
                    return Ok(Redeem::AlreadyMember);
                }
                Err(e) => return Err(e.into()),
            }

            let marked = tx.execute(
                "UPDATE invites SET used = 1, accepted_by = ?2, used_at = ?3
                 WHERE id = ?1 AND used = 0 AND cancelled = 0 AND expires_at > ?3",
                params![invite_id, user_id, format_ts(now)],
            )?;
            if marked == 0 {
                // Dropping the transaction rolls back the membership insert.
                return Ok(Redeem::Consumed);
            }

            let detail = format!("invite {} accepted as {}", invite_id, role);
            insert_audit(&tx, board_id, Some(user_id), AuditAction::InviteAccepted, &detail, now)?;
            tx.commit()?;
            Ok(Redeem::Accepted)
        })
    }

    // -- Audit --

    pub fn record_audit(
        &self,
        board_id: &str,
        actor_id: Option<&str>,
        action: AuditAction,
        detail: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| insert_audit(conn, board_id, actor_id, action, detail, now))
    }

    /// Most recent events first.
    pub fn list_audit(&self, board_id: &str, limit: u32) -> Result<Vec<AuditRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, board_id, actor_id, action, detail, created_at
                 FROM audit_events
                 WHERE board_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![board_id, limit], |row| {
                    Ok(AuditRow {
                        id: row.get(0)?,
                        board_id: row.get(1)?,
                        actor_id: row.get(2)?,
                        action: row.get(3)?,
                        detail: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, username, password, created_at FROM users WHERE {column} = ?1");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;
    Ok(row)
}
