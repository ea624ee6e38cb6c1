//! Basic authentication for the document store.
//!
//! The password comes from an external secret source: the
//! `BOTDIAG_STORE_PASSWORD` environment variable, explicit configuration, or
//! a password file (first line, surrounding whitespace trimmed).

use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Basic-auth credentials.
#[derive(Clone)]
pub enum Credentials {
    /// User and password sent on every request.
    Basic { username: String, password: String },

    /// No authentication.
    None,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Attach the credentials to a request.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
            Self::None => request,
        }
    }

    /// Check if authentication is configured.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::None => f.write_str("None"),
        }
    }
}

/// Read a password from the first line of `path`.
pub fn read_password_file(path: &Path) -> StoreResult<String> {
    let text = std::fs::read_to_string(path).map_err(|e| StoreError::Config {
        message: format!("cannot read password file {}: {}", path.display(), e),
    })?;
    let password = text.lines().next().unwrap_or_default().trim().to_string();
    if password.is_empty() {
        return Err(StoreError::Config {
            message: format!("password file {} is empty", path.display()),
        });
    }
    Ok(password)
}
