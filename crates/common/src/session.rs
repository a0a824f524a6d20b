//! Identity handed to the pipeline by the external session collaborator.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Header carrying the authenticated user id on every request.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role.
pub const ROLE_HEADER: &str = "x-user-role";

/// The shopper's session as seen by the cart and order pipeline.
///
/// Session issuance lives outside this workspace; this type only carries the
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { user_id: UserId, role: Role },
}

impl Session {
    /// Creates an authenticated customer session.
    pub fn customer(user_id: UserId) -> Self {
        Session::Authenticated {
            user_id,
            role: Role::Customer,
        }
    }

    /// Creates an authenticated admin session.
    pub fn admin(user_id: UserId) -> Self {
        Session::Authenticated {
            user_id,
            role: Role::Admin,
        }
    }

    /// Returns the authenticated user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { user_id, .. } => Some(*user_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Session::Authenticated {
                role: Role::Admin,
                ..
            }
        )
    }

    /// Returns true if this session may read or modify `owner`'s resources.
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id() == Some(owner)
    }
}
