//! Post-commit notifications

use thiserror::Error;

use crate::model::User;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Told about new users once their creation has committed.
/// A failure here never undoes the creation.
pub trait Notifier {
    fn user_created(&self, user: &User) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn user_created(&self, user: &User) -> Result<(), NotifyError> {
        tracing::info!(identifier = %user.identifier, role = %user.role, "credentials delivery requested");
        Ok(())
    }
}
