//! Credentials
//!
//! Opaque identity material for one backend. A credential is immutable once
//! issued; backends only inspect its kind and read the fields they need.

use serde::{Deserialize, Serialize};

/// Identity material authorizing a session
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Bearer token obtained from an authorization-code exchange
    #[serde(rename = "oauth")]
    OAuthToken { token: String },

    /// Username and password pair
    UsernamePassword { username: String, password: String },

    /// Access key and secret key pair
    KeyPair {
        access_key: String,
        secret_key: String,
    },

    /// No identity at all
    #[default]
    Anonymous,
}

/// Discriminant of a [`Credential`], used for compatibility checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    OAuthToken,
    UsernamePassword,
    KeyPair,
    Anonymous,
}

impl Credential {
    pub fn oauth(token: impl Into<String>) -> Self {
        Credential::OAuthToken {
            token: token.into(),
        }
    }

    pub fn user_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn key_pair(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Credential::KeyPair {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::OAuthToken { .. } => CredentialKind::OAuthToken,
            Credential::UsernamePassword { .. } => CredentialKind::UsernamePassword,
            Credential::KeyPair { .. } => CredentialKind::KeyPair,
            Credential::Anonymous => CredentialKind::Anonymous,
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CredentialKind::OAuthToken => "oauth",
            CredentialKind::UsernamePassword => "username/password",
            CredentialKind::KeyPair => "key pair",
            CredentialKind::Anonymous => "anonymous",
        };
        f.write_str(name)
    }
}

// Secrets never reach logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::OAuthToken { .. } => f
                .debug_struct("OAuthToken")
                .field("token", &"***")
                .finish(),
            Credential::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credential::KeyPair { access_key, .. } => f
                .debug_struct("KeyPair")
                .field("access_key", access_key)
                .field("secret_key", &"***")
                .finish(),
            Credential::Anonymous => f.write_str("Anonymous"),
        }
    }
}
