//! Authenticated user identity.
//!
//! The identity provider hands back a user profile; the only thing Dossier
//! keeps from it is a stable identifier used to namespace the draft store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity used when the provider authenticated the user but returned no
/// subject claim.
pub const ANONYMOUS_AUTHENTICATED: &str = "anonymous_authenticated";

/// Opaque stable identifier of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User profile as returned by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject claim. Becomes the `UserIdentity`.
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    /// Identity derived from this profile.
    pub fn identity(&self) -> UserIdentity {
        match self.sub.as_deref() {
            Some(sub) if !sub.is_empty() => UserIdentity::new(sub),
            _ => UserIdentity::new(ANONYMOUS_AUTHENTICATED),
        }
    }

    /// Label shown next to the logout button.
    pub fn display_label(&self) -> &str {
        self.email.as_deref().unwrap_or("User")
    }
}
