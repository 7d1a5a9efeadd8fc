use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AuditAction, Role};

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Boards --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBoardRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoardResponse {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    /// Caller's effective role on this board.
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

// -- Invites --

/// Both fields are optional at the wire level so a missing email surfaces as
/// a validation error instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInviteRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed { reason: String },
}

/// Returned to the issuing owner. Never carries the raw token.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateInviteResponse {
    pub invite_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub delivery: DeliveryStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub used: bool,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateInviteQuery {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvitePreviewResponse {
    pub board_id: Uuid,
    pub board_title: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptInviteRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptInviteResponse {
    pub board_id: Uuid,
}

// -- Audit --

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditEventResponse {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}
