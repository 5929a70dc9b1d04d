//! Identity provider for non-browser use.
//!
//! The command line has no redirect flow. `StaticIdentityProvider` holds a
//! fixed profile (from `--user` or `DOSSIER_USER`); the session starts
//! authenticated when one is present. "Logging in" without a profile fails
//! with a hint instead of redirecting.

use std::sync::atomic::{AtomicBool, Ordering};

use dossier_core::auth::IdentityProvider;
use dossier_types::error::AuthError;
use dossier_types::identity::UserProfile;

/// Environment variable naming the user when `--user` is not given.
pub const USER_ENV: &str = "DOSSIER_USER";

pub struct StaticIdentityProvider {
    profile: Option<UserProfile>,
    authenticated: AtomicBool,
}

impl StaticIdentityProvider {
    pub fn new(profile: Option<UserProfile>) -> Self {
        let authenticated = AtomicBool::new(profile.is_some());
        Self {
            profile,
            authenticated,
        }
    }

    /// Provider for a user known only by subject.
    pub fn for_subject(sub: impl Into<String>) -> Self {
        Self::new(Some(UserProfile {
            sub: Some(sub.into()),
            ..UserProfile::default()
        }))
    }

    /// Provider for `explicit`, else `DOSSIER_USER`, else nobody.
    pub fn from_env(explicit: Option<String>) -> Self {
        match explicit.or_else(|| std::env::var(USER_ENV).ok()) {
            Some(sub) if !sub.trim().is_empty() => Self::for_subject(sub.trim()),
            _ => Self::new(None),
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    async fn initialize(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn is_authenticated(&self) -> Result<bool, AuthError> {
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    async fn get_user(&self) -> Result<Option<UserProfile>, AuthError> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(self.profile.clone())
        } else {
            Ok(None)
        }
    }

    async fn login_with_redirect(&self) -> Result<(), AuthError> {
        if self.profile.is_some() {
            self.authenticated.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(AuthError::Provider(format!(
                "no user configured; pass --user or set {USER_ENV}"
            )))
        }
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.authenticated.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_redirect_callback(&self) -> Result<(), AuthError> {
        Err(AuthError::Callback(
            "redirect callbacks are not supported here".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::auth::{resolve_identity, AuthOutcome};

    #[tokio::test]
    async fn test_known_subject_resolves() {
        let provider = StaticIdentityProvider::for_subject("U1");
        match resolve_identity(&provider, "").await.unwrap() {
            AuthOutcome::Authenticated { identity, .. } => assert_eq!(identity.as_str(), "U1"),
            AuthOutcome::LoginRequired => panic!("expected an authenticated user"),
        }
    }

    #[tokio::test]
    async fn test_no_user_cannot_log_in() {
        let provider = StaticIdentityProvider::new(None);
        assert!(!provider.is_authenticated().await.unwrap());
        assert!(matches!(
            resolve_identity(&provider, "").await,
            Err(AuthError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_then_login() {
        let provider = StaticIdentityProvider::for_subject("U1");
        provider.logout().await.unwrap();
        assert!(provider.get_user().await.unwrap().is_none());
        provider.login_with_redirect().await.unwrap();
        assert!(provider.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_callback_failure_is_not_fatal() {
        let provider = StaticIdentityProvider::for_subject("U1");
        let outcome = resolve_identity(&provider, "?code=abc&state=xyz").await.unwrap();
        assert!(matches!(outcome, AuthOutcome::Authenticated { .. }));
    }

    #[test]
    fn test_explicit_user_wins() {
        let provider = StaticIdentityProvider::from_env(Some(" U9 ".to_string()));
        assert_eq!(
            provider.profile.as_ref().and_then(|p| p.sub.as_deref()),
            Some("U9")
        );
    }
}
