//! GitHub OAuth2 strategy.
//!
//! Exchanges the callback code for a profile and resolves it. The link key
//! is the GitHub login handle, so renaming a handle orphans the link (the
//! next login with an unchanged email re-links by address).

use tracing::info;

use crate::auth::models::{ProfileFields, ProviderKind, User};
use crate::auth::resolver::{AuthError, IdentityResolver};
use crate::common::helpers::safe_email_log;
use crate::common::validation::is_valid_email;
use crate::services::oauth::{GithubProfile, OAuthClient};

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Normalize a raw GitHub profile into (link key, email, profile fields).
pub(crate) fn normalize(profile: GithubProfile) -> Result<(String, String, ProfileFields), AuthError> {
    // GitHub only exposes the email the user has made public; without it
    // there is nothing to resolve against
    let email = non_empty(profile.email).ok_or_else(|| {
        AuthError::Validation(
            "No email found. Please make sure your email is public on GitHub.".to_string(),
        )
    })?;

    if !is_valid_email(&email) {
        return Err(AuthError::Validation(
            "GitHub profile email is not a valid email address".to_string(),
        ));
    }

    let fields = ProfileFields {
        name: non_empty(profile.name),
        avatar_url: non_empty(profile.avatar_url),
        email_verified: None,
    };

    Ok((profile.login, email, fields))
}

pub async fn authenticate(
    resolver: &IdentityResolver,
    oauth: &OAuthClient,
    code: &str,
) -> Result<User, AuthError> {
    let profile = oauth.github_exchange(code).await?;
    let (login, email, fields) = normalize(profile)?;

    let user = resolver
        .resolve_or_link_provider(ProviderKind::Github, &login, &email, fields)
        .await?;

    info!(email = safe_email_log(&email), "GitHub login succeeded");

    Ok(user)
}
