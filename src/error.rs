//! Error types for hierarchy-authz

use std::fmt;

use thiserror::Error;

use crate::model::{EntityKind, Id};
use crate::policy::{Action, Target};

/// Which rule rejected a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No principal, and bootstrap mode is not open.
    Unauthenticated,
    /// None of the rules in the row for this target and action matched.
    NoMatchingRule { target: Target, action: Action },
    /// Principals may not delete themselves.
    SelfDelete,
    /// ADMIN users cannot be deleted through the engine.
    AdminTarget,
    /// A project director tried to place a user in a project they do not direct.
    ForeignProject { project: Option<Id> },
    /// Bootstrap seeding was requested after bootstrap mode was closed.
    BootstrapClosed,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Unauthenticated => write!(f, "no authenticated principal"),
            Denial::NoMatchingRule { target, action } => {
                let rules: Vec<String> = crate::policy::rules_for(*target, *action)
                    .iter()
                    .map(|r| r.to_string())
                    .collect();
                write!(f, "no rule grants {} on {} (requires one of: {})", action, target, rules.join(", "))
            }
            Denial::SelfDelete => write!(f, "a principal cannot delete itself"),
            Denial::AdminTarget => write!(f, "ADMIN users cannot be deleted"),
            Denial::ForeignProject { project: Some(p) } => {
                write!(f, "project {} is not directed by the caller", p)
            }
            Denial::ForeignProject { project: None } => {
                write!(f, "membership outside the caller's project cannot be cleared")
            }
            Denial::BootstrapClosed => write!(f, "bootstrap mode is closed"),
        }
    }
}

/// The error type for every engine and store operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("permission denied: {0}")]
    PermissionDenied(Denial),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Id },

    #[error("{kind} {id} still has {dependents} dependent(s); use cascade or safe delete")]
    IntegrityViolation { kind: EntityKind, id: Id, dependents: u64 },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn denied(d: Denial) -> Self {
        Error::PermissionDenied(d)
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::ValidationFailed(msg.into())
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Error::PermissionDenied(_))
    }
}

/// Result type alias for hierarchy-authz operations
pub type Result<T> = std::result::Result<T, Error>;

/// Convert any storage-level error to Error::Storage
pub fn err<E: std::error::Error>(e: E) -> Error {
    Error::Storage(e.to_string())
}
