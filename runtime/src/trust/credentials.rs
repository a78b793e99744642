//! Caller-supplied login credentials.

use std::fmt;

/// Username and password for the portal.
///
/// `Debug` never prints the password, so credentials can sit inside structs
/// that get logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials from optional sources, rejecting blank values.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        let username = username.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
        let password = password.filter(|p| !p.is_empty())?;
        Some(Self::new(username, password))
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &crate::trust::redact::REDACTED)
            .finish()
    }
}
