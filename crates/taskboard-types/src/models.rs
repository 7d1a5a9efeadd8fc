use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims issued at login and checked by the REST middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Roles --

/// Board membership role. `Owner` is never stored for anyone other than the
/// board's owner; it is derived from the board row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    /// Role granted by an invite that does not name one.
    pub const LOWEST: Role = Role::Viewer;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Editor => "Editor",
            Self::Viewer => "Viewer",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::LOWEST
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Owner" => Ok(Self::Owner),
            "Editor" => Ok(Self::Editor),
            "Viewer" => Ok(Self::Viewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// -- Audit --

/// Board-scoped events recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "board.created")]
    BoardCreated,
    #[serde(rename = "invite.created")]
    InviteCreated,
    #[serde(rename = "invite.resent")]
    InviteResent,
    #[serde(rename = "invite.cancelled")]
    InviteCancelled,
    #[serde(rename = "invite.accepted")]
    InviteAccepted,
    #[serde(rename = "membership.created")]
    MembershipCreated,
    #[serde(rename = "membership.role_corrected")]
    MembershipRoleCorrected,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BoardCreated => "board.created",
            Self::InviteCreated => "invite.created",
            Self::InviteResent => "invite.resent",
            Self::InviteCancelled => "invite.cancelled",
            Self::InviteAccepted => "invite.accepted",
            Self::MembershipCreated => "membership.created",
            Self::MembershipRoleCorrected => "membership.role_corrected",
        }
    }

    pub const ALL: [AuditAction; 7] = [
        Self::BoardCreated,
        Self::InviteCreated,
        Self::InviteResent,
        Self::InviteCancelled,
        Self::InviteAccepted,
        Self::MembershipCreated,
        Self::MembershipRoleCorrected,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_its_own_display() {
        for role in [Role::Owner, Role::Editor, Role::Viewer] {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn unknown_role_names_the_bad_value() {
        let err = "admin".parse::<Role>().unwrap_err();
        assert_eq!(err, UnknownRole("admin".into()));
        assert_eq!(err.to_string(), "unknown role 'admin'");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn default_role_is_lowest_privilege() {
        assert_eq!(Role::default(), Role::Viewer);
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"Editor\"");
    }

    #[test]
    fn audit_action_serializes_as_dotted_name() {
        let json = serde_json::to_string(&AuditAction::MembershipRoleCorrected).unwrap();
        assert_eq!(json, format!("\"{}\"", AuditAction::MembershipRoleCorrected.as_str()));

        for action in AuditAction::ALL {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("board.deleted"), None);
    }
}
