//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::repo::RepoError;
use super::session::decode_session;
use crate::common::validation::is_valid_email;
use crate::common::{safe_email_log, safe_token_log, ApiError, AppState};

/// Authenticated caller, asserted by a valid session token.
///
/// Carries exactly the id and email the session vouches for. The extractor
/// re-checks the shape of both (a signed token is trusted for authenticity,
/// not for well-formedness) and confirms the user row still exists, so
/// deleting an account invalidates every outstanding session for it.
#[derive(Debug)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Infrastructure("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        // Extract Bearer token from Authorization header
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let token = match token {
            Some(t) => t,
            None => {
                warn!("Authentication failed: missing Authorization header");
                return Err(ApiError::Unauthorized("missing auth".into()));
            }
        };

        // Handle "Bearer <token>" format or raw token
        let bare_token = token.strip_prefix("Bearer ").unwrap_or(&token);

        let claims = match decode_session(&app_state.jwt_secret, bare_token) {
            Some(c) => c,
            None => {
                warn!(
                    token = %safe_token_log(bare_token),
                    "Authentication failed: session token rejected"
                );
                return Err(ApiError::Unauthorized("invalid token".into()));
            }
        };

        // A token that verified but carries malformed identity fields could
        // only have been signed by this service, so treat it as our bug,
        // not the caller's
        if Uuid::parse_str(&claims.sub).is_err() || !is_valid_email(&claims.email) {
            return Err(ApiError::Infrastructure(
                "session token carries malformed identity".to_string(),
            ));
        }

        let user = app_state
            .repo
            .find_by_id(&claims.sub)
            .await
            .map_err(|e| match e {
                RepoError::Database(db) => ApiError::DatabaseError(db),
                other => ApiError::Infrastructure(format!(
                    "user lookup during authentication failed: {}",
                    other
                )),
            })?;

        match user {
            Some(u) => {
                debug!(
                    user_id = %u.id,
                    email = %safe_email_log(&u.email),
                    "Session authentication successful"
                );
                Ok(SessionUser {
                    id: u.id,
                    email: u.email,
                })
            }
            None => {
                warn!(user_id = %claims.sub, "Authentication failed: user no longer exists");
                Err(ApiError::Unauthorized("user not found".into()))
            }
        }
    }
}
