//! Credential strategies. Each variant of [`AuthAttempt`] carries the raw
//! material of one credential source; [`authenticate`] dispatches it to the
//! matching strategy, and every strategy ends in the resolver, so all four
//! sources converge on the same canonical user row.

pub mod github;
pub mod google;
pub mod local;
pub mod magic_link;

use crate::services::oauth::OAuthClient;
use crate::services::tokens::TokenService;

use super::models::User;
use super::resolver::{AuthError, IdentityResolver};

/// One authentication attempt, whatever the source.
#[derive(Debug)]
pub enum AuthAttempt {
    Local { email: String, password: String },
    Github { code: String },
    Google { code: String },
    MagicLink { token: String },
}

pub async fn authenticate(
    resolver: &IdentityResolver,
    oauth: &OAuthClient,
    tokens: &TokenService,
    attempt: AuthAttempt,
) -> Result<User, AuthError> {
    match attempt {
        AuthAttempt::Local { email, password } => {
            local::authenticate(resolver, &email, &password).await
        }
        AuthAttempt::Github { code } => github::authenticate(resolver, oauth, &code).await,
        AuthAttempt::Google { code } => google::authenticate(resolver, oauth, &code).await,
        AuthAttempt::MagicLink { token } => {
            magic_link::authenticate(resolver, tokens, &token).await
        }
    }
}
