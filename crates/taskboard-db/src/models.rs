//! Database row types. These map directly to SQLite rows and stay independent
//! of the API models in taskboard-types.

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use taskboard_types::models::Role;

/// Fixed-width RFC 3339 (microseconds, `Z`), so SQL string comparison of two
/// stored timestamps is chronological.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

fn parse_role(raw: &str) -> Result<Role> {
    raw.parse::<Role>().map_err(|e| anyhow!("Corrupt role column: {}", e))
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct BoardRow {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub created_at: String,
}

pub struct MembershipRow {
    pub board_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

impl MembershipRow {
    pub fn role(&self) -> Result<Role> {
        parse_role(&self.role)
    }
}

/// Membership joined with the member's username.
pub struct MemberRow {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
}

impl MemberRow {
    pub fn role(&self) -> Result<Role> {
        parse_role(&self.role)
    }
}

pub struct InviteRow {
    pub id: String,
    pub board_id: String,
    pub email: String,
    pub role: String,
    pub token_hash: String,
    pub used: bool,
    pub cancelled: bool,
    pub invited_by: Option<String>,
    pub accepted_by: Option<String>,
    pub created_at: String,
    pub expires_at: String,
    pub used_at: Option<String>,
}

impl InviteRow {
    pub fn role(&self) -> Result<Role> {
        parse_role(&self.role)
    }
}

pub struct AuditRow {
    pub id: String,
    pub board_id: String,
    pub actor_id: Option<String>,
    pub action: String,
    pub detail: String,
    pub created_at: String,
}
