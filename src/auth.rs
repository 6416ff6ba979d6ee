//! Back-office admin gate.
//!
//! A single shared-secret comparison that toggles the session's admin flag.
//! Explicitly a placeholder, not a security boundary: no hashing, lockout,
//! expiry, or logout. Callers that need real access control must replace it.

use tracing::warn;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::session::Session;

/// Compare the submitted secret against the configured one and record the
/// outcome on the session. Every attempt overwrites the flag, so a wrong
/// secret also revokes a previously granted session.
pub fn login(session: &mut Session, submitted: &str, config: &AppConfig) -> bool {
    session.admin = submitted == config.admin_password;
    if !session.admin {
        warn!("Rejected admin login attempt");
    }
    session.admin
}

/// Handler guard for the back-office pages.
pub fn require_admin(session: &Session) -> Result<()> {
    if session.admin {
        Ok(())
    } else {
        Err(Error::Validation(
            "Enter the admin password to open the back office".to_string(),
        ))
    }
}
