//! Viewer identity models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::AuthError;

/// User ID type
pub type UserId = i64;

/// Role carried in an access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Staff,
    Organizer,
    Judge,
    Spectator,
}

impl ViewerRole {
    /// Staff and organizers see and manage every ranking
    pub fn is_manager(self) -> bool {
        matches!(self, ViewerRole::Staff | ViewerRole::Organizer)
    }
}

impl fmt::Display for ViewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerRole::Staff => write!(f, "staff"),
            ViewerRole::Organizer => write!(f, "organizer"),
            ViewerRole::Judge => write!(f, "judge"),
            ViewerRole::Spectator => write!(f, "spectator"),
        }
    }
}

impl FromStr for ViewerRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staff" => Ok(ViewerRole::Staff),
            "organizer" => Ok(ViewerRole::Organizer),
            "judge" => Ok(ViewerRole::Judge),
            "spectator" => Ok(ViewerRole::Spectator),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

/// Identity presented by an HTTP request or live connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viewer {
    #[default]
    Anonymous,
    Authenticated {
        user_id: UserId,
        username: String,
        role: ViewerRole,
    },
}

impl Viewer {
    pub fn role(&self) -> Option<ViewerRole> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated { role, .. } => Some(*role),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated { user_id, .. } => Some(*user_id),
        }
    }

    /// True for staff and organizers
    pub fn is_manager(&self) -> bool {
        self.role().is_some_and(ViewerRole::is_manager)
    }
}

impl fmt::Display for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Viewer::Anonymous => write!(f, "anonymous"),
            Viewer::Authenticated {
                user_id,
                username,
                role,
            } => write!(f, "{username}#{user_id} ({role})"),
        }
    }
}

/// JWT access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: UserId,
    pub username: String,
    pub role: ViewerRole,
    pub exp: i64,
    pub iat: i64,
}

impl From<AccessTokenClaims> for Viewer {
    fn from(claims: AccessTokenClaims) -> Self {
        Viewer::Authenticated {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}
