//! Acting principals and where they come from

use serde::{Deserialize, Serialize};

use crate::constants::{SYSTEM_IDENTIFIER, SYSTEM_PRINCIPAL_ID};
use crate::model::{Id, Role, User};

/// The identity a mutation is performed on behalf of.
///
/// Always passed explicitly; the engine never reads an ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Id,
    pub role: Role,
    pub identifier: String,
}

impl Principal {
    pub fn new(id: Id, role: Role, identifier: impl Into<String>) -> Self {
        Principal { id, role, identifier: identifier.into() }
    }

    /// The non-persisted seeding identity
    pub fn system() -> Self {
        Principal::new(SYSTEM_PRINCIPAL_ID, Role::System, SYSTEM_IDENTIFIER)
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Build a principal for a stored user. Unsaved users have no identity.
    pub fn from_user(user: &User) -> Option<Self> {
        user.id.map(|id| Principal::new(id, user.role, user.identifier.clone()))
    }
}

/// Yields the authenticated identity of the caller, if any.
pub trait PrincipalProvider {
    fn current_principal(&self) -> Option<Principal>;
}

/// Provider that always reports the same identity
#[derive(Debug, Clone, Default)]
pub struct FixedPrincipal(pub Option<Principal>);

impl FixedPrincipal {
    pub fn anonymous() -> Self {
        FixedPrincipal(None)
    }

    pub fn system() -> Self {
        FixedPrincipal(Some(Principal::system()))
    }
}

impl PrincipalProvider for FixedPrincipal {
    fn current_principal(&self) -> Option<Principal> {
        self.0.clone()
    }
}
