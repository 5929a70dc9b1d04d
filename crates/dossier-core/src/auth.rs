//! Identity provider port and the page-load authentication bootstrap.

use std::future::Future;

use tracing::{info, warn};

use dossier_types::error::AuthError;
use dossier_types::identity::{UserIdentity, UserProfile};

/// Third-party identity provider, treated as an opaque capability.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in dossier-infra.
pub trait IdentityProvider: Send + Sync {
    fn initialize(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn is_authenticated(&self) -> impl Future<Output = Result<bool, AuthError>> + Send;

    fn get_user(&self) -> impl Future<Output = Result<Option<UserProfile>, AuthError>> + Send;

    /// Start an interactive login. The current page is abandoned.
    fn login_with_redirect(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn logout(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Finish a login whose redirect brought the user back to this page.
    fn handle_redirect_callback(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Result of the authentication bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated {
        identity: UserIdentity,
        profile: UserProfile,
    },
    /// The user was sent to log in; nothing else should run on this page.
    LoginRequired,
}

/// Whether a page query string carries a login redirect callback.
pub fn is_redirect_callback(query: &str) -> bool {
    let query = query.strip_prefix('?').unwrap_or(query);
    let has = |param: &str| query.split('&').any(|pair| pair.starts_with(param));
    has("code=") && has("state=")
}

/// Resolve the user for this page load.
///
/// Completes a pending redirect callback first; a failed callback is logged
/// and the authenticated check decides. Users without a subject claim get a
/// shared fallback identity.
pub async fn resolve_identity<P: IdentityProvider>(
    provider: &P,
    query: &str,
) -> Result<AuthOutcome, AuthError> {
    provider.initialize().await?;

    if is_redirect_callback(query) {
        if let Err(err) = provider.handle_redirect_callback().await {
            warn!(error = %err, "redirect callback failed");
        }
    }

    if !provider.is_authenticated().await? {
        info!("user not authenticated, redirecting to login");
        provider.login_with_redirect().await?;
        return Ok(AuthOutcome::LoginRequired);
    }

    let profile = provider.get_user().await?.unwrap_or_default();
    let identity = profile.identity();
    info!(identity = %identity, "user authenticated");
    Ok(AuthOutcome::Authenticated { identity, profile })
}
