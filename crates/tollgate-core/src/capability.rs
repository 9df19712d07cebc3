//! Capabilities the engine drives but does not implement.

use regex::Regex;
use serde_json::Value;

use crate::error::IdentityError;

/// Environment variable naming the invoking user after `sudo`.
pub const SUDO_USER_VAR: &str = "SUDO_USER";

const USERNAME_PATTERN: &str = r"\A[a-z][a-z0-9]{0,20}\z";

/// Executes the unit of work behind a tool.
pub trait Runner {
    /// Run with the final `(name, value)` variables. Returns `true` on
    /// success; any output goes straight to the terminal.
    fn run(&mut self, variables: &[(String, Value)], verbosity: u8) -> bool;
}

/// Identity checks and privilege elevation.
pub trait Privileges {
    /// Whether the process is running as `user`.
    fn is_user(&self, user: &str) -> Result<bool, IdentityError>;

    /// Continue as `user`, re-executing the process if necessary, and
    /// return the name of the user that invoked the elevation.
    fn become_user(&self, user: &str) -> Result<String, IdentityError>;
}

/// Validate the invoking user reported by the elevation mechanism against
/// `^[a-z][a-z0-9]{0,20}$`.
pub fn validate_sudo_user(value: Option<&str>) -> Result<String, IdentityError> {
    let Some(user) = value else {
        return Err(IdentityError::MissingSudoUser);
    };

    let invalid = || IdentityError::InvalidSudoUser(user.to_string());
    let pattern = Regex::new(USERNAME_PATTERN).map_err(|_| invalid())?;
    if !pattern.is_match(user) {
        tracing::warn!(user, "rejected invoking user");
        return Err(invalid());
    }
    Ok(user.to_string())
}
