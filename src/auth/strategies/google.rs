//! Google OAuth2 strategy.
//!
//! The link key is the stable `sub` claim from Google's userinfo endpoint.
//! Google also asserts whether it has verified the email; an unverified
//! address can still log into an existing account but never creates one.

use tracing::info;

use crate::auth::models::{ProfileFields, ProviderKind, User};
use crate::auth::resolver::{AuthError, IdentityResolver};
use crate::common::helpers::safe_email_log;
use crate::common::validation::is_valid_email;
use crate::services::oauth::{GoogleProfile, OAuthClient};

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Normalize a raw Google profile into (link key, email, profile fields).
pub(crate) fn normalize(profile: GoogleProfile) -> Result<(String, String, ProfileFields), AuthError> {
    let email = non_empty(profile.email).ok_or_else(|| {
        AuthError::Validation("Google account did not provide an email address".to_string())
    })?;

    if !is_valid_email(&email) {
        return Err(AuthError::Validation(
            "Google profile email is not a valid email address".to_string(),
        ));
    }

    let fields = ProfileFields {
        name: non_empty(profile.name),
        avatar_url: non_empty(profile.picture),
        email_verified: Some(profile.email_verified.unwrap_or(false)),
    };

    Ok((profile.sub, email, fields))
}

pub async fn authenticate(
    resolver: &IdentityResolver,
    oauth: &OAuthClient,
    code: &str,
) -> Result<User, AuthError> {
    let profile = oauth.google_exchange(code).await?;
    let (sub, email, fields) = normalize(profile)?;

    let user = resolver
        .resolve_or_link_provider(ProviderKind::Google, &sub, &email, fields)
        .await?;

    info!(email = safe_email_log(&email), "Google login succeeded");

    Ok(user)
}
