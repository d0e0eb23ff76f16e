//! Email/password strategy.

use tracing::info;

use crate::auth::models::User;
use crate::auth::resolver::{AuthError, IdentityResolver};
use crate::common::helpers::safe_email_log;

pub async fn authenticate(
    resolver: &IdentityResolver,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let user = resolver.resolve_by_password(email, password).await?;

    info!(email = safe_email_log(email), "Password login succeeded");

    Ok(user)
}
