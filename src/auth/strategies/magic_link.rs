//! Magic-link strategy.
//!
//! A single callback consumes both magic-link token purposes. Sign-up
//! tokens create the account, which starts out unverified like any other
//! fresh account; login tokens additionally pin the token subject to the
//! stored user id, so a token minted before an account was deleted and
//! re-created cannot log into the new account.

use tracing::info;

use crate::auth::models::User;
use crate::auth::resolver::{AuthError, IdentityResolver};
use crate::common::helpers::safe_email_log;
use crate::common::validation::is_valid_email;
use crate::services::tokens::{TokenPurpose, TokenService};

pub async fn authenticate(
    resolver: &IdentityResolver,
    tokens: &TokenService,
    token: &str,
) -> Result<User, AuthError> {
    let payload = tokens.verify(token)?;

    let email = payload
        .claims
        .email
        .as_deref()
        .filter(|e| is_valid_email(e))
        .ok_or(AuthError::TokenInvalid)?;

    match payload.claims.purpose {
        TokenPurpose::MagicLinkSignUp => {
            let (user, created) = resolver
                .resolve_or_create_by_email(email, payload.claims.name.as_deref())
                .await?;

            if !created {
                return Err(AuthError::Conflict(
                    "User with this email already exists. Please login instead.".to_string(),
                ));
            }

            info!(email = safe_email_log(email), "Magic link sign-up succeeded");

            Ok(user)
        }
        TokenPurpose::MagicLinkLogin => {
            let user = resolver.lookup_by_email(email).await?.ok_or_else(|| {
                AuthError::Validation(
                    "User with this email does not exist. Please sign up first.".to_string(),
                )
            })?;

            // the token was minted for a specific user row
            if payload.subject != user.id {
                return Err(AuthError::TokenInvalid);
            }

            info!(email = safe_email_log(email), "Magic link login succeeded");

            Ok(user)
        }
        // any other purpose has no business at this callback
        TokenPurpose::EmailVerification => Err(AuthError::TokenInvalid),
    }
}
