//! Identity as seen by the scheduling core.
//!
//! Authentication and sessions belong to the external identity provider. The core receives
//! a plain `(user_id, role)` pair and dispatches on the role tag.

pub use crate::entities::Role;

/// The authenticated caller of a core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Id of the acting user
    pub user_id: i64,
    /// Role reported by the identity provider
    pub role: Role,
}

impl Actor {
    /// Builds an actor from the pair supplied by the identity provider.
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

impl Role {
    /// Landing page for a signed-in user of this role.
    #[must_use]
    pub const fn dashboard_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Teacher => "/teacher",
            Self::User => "/student",
        }
    }
}
