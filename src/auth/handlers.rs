//! Authentication handlers

use axum::extract::{Extension, Json, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::extractors::SessionUser;
use super::models::{
    LoginRequest, MagicLinkRequest, MagicLinkValidator, SignUpRequest, SignUpValidator,
    TokenQuery,
};
use super::session::issue_session;
use super::strategies::{authenticate, AuthAttempt};
use crate::common::{safe_email_log, ApiError, AppState, Validator};
use crate::services::oauth::login_state;
use crate::services::{MagicLinkTarget, TokenPurpose};

/// Flat delay before answering endpoints whose fast path would otherwise
/// reveal whether an email is registered.
const TIMING_MASK_DELAY_MS: u64 = 500;

async fn read_state(state_lock: &Arc<RwLock<AppState>>) -> AppState {
    state_lock.read().await.clone()
}

fn frontend_session_redirect(state: &AppState, token: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/auth/callback?token={}",
        state.frontend_url,
        urlencoding::encode(token)
    ))
}

/// POST /api/v1/auth/signup
///
/// Creates a local account, signs a session, and sends the verification
/// email in the background. The response never waits on SES.
pub async fn signup(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Response, ApiError> {
    info!("🔐 Received signup request");
    let state = read_state(&state_lock).await;

    let validation = SignUpValidator.validate(&payload);
    if !validation.is_valid {
        return Err(validation.into());
    }

    let user = state
        .resolver
        .register_local(&payload.email, &payload.password, payload.name.as_deref())
        .await
        .map_err(ApiError::from)?;

    let token = issue_session(&state.jwt_secret, &user).map_err(ApiError::from)?;

    // fire and forget; a failed send is recoverable via resend-verification
    let verification = state.verification.clone();
    let user_id = user.id.clone();
    let email = user.email.clone();
    tokio::spawn(async move {
        if let Err(e) = verification.send_verification_email(&user_id, &email).await {
            error!(
                error = %e,
                email = safe_email_log(&email),
                "Failed to send verification email after signup"
            );
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "token": token, "user": user })),
    )
        .into_response())
}

/// POST /api/v1/auth/login
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!("🔐 Received login request");
    let state = read_state(&state_lock).await;

    let user = authenticate(
        &state.resolver,
        &state.oauth,
        &state.tokens,
        AuthAttempt::Local {
            email: payload.email,
            password: payload.password,
        },
    )
    .await
    .map_err(ApiError::from)?;

    let token = issue_session(&state.jwt_secret, &user).map_err(ApiError::from)?;

    Ok(Json(serde_json::json!({ "token": token, "user": user })))
}

/// POST /api/v1/auth/magic-link
///
/// Sends a login link when the email is registered and a sign-up link when
/// it is not, and tells the caller which, so the frontend can phrase its
/// check-your-inbox screen.
pub async fn request_magic_link(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<MagicLinkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!("🔐 Received magic link request");
    let state = read_state(&state_lock).await;

    let validation = MagicLinkValidator.validate(&payload);
    if !validation.is_valid {
        return Err(validation.into());
    }

    let (target, message) = match state
        .resolver
        .lookup_by_email(&payload.email)
        .await
        .map_err(ApiError::from)?
    {
        Some(user) => (
            MagicLinkTarget::Login {
                user_id: user.id,
                email: user.email,
            },
            "A sign-in link has been sent. Please check your inbox.",
        ),
        None => (
            MagicLinkTarget::SignUp {
                email: payload.email.clone(),
                name: payload.name.clone(),
            },
            "A sign-up link has been sent. Please check your inbox.",
        ),
    };

    let verification = state.verification.clone();
    let email = payload.email.clone();
    tokio::spawn(async move {
        if let Err(e) = verification.send_magic_link(target).await {
            error!(
                error = %e,
                email = safe_email_log(&email),
                "Failed to send magic link"
            );
        }
    });

    Ok(Json(serde_json::json!({ "message": message })))
}

/// GET /api/v1/auth/magic-link/callback?token=...
pub async fn magic_link_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(query): Query<TokenQuery>,
) -> Result<Redirect, ApiError> {
    info!("🔐 Received magic link callback");
    let state = read_state(&state_lock).await;

    let user = authenticate(
        &state.resolver,
        &state.oauth,
        &state.tokens,
        AuthAttempt::MagicLink { token: query.token },
    )
    .await
    .map_err(ApiError::from)?;

    // a login link proves mailbox control as a side effect, but only the
    // verification flow may flip the flag; nudge unverified users instead
    if !user.is_email_verified {
        let verification = state.verification.clone();
        let user_id = user.id.clone();
        let email = user.email.clone();
        tokio::spawn(async move {
            if let Err(e) = verification.send_verification_email(&user_id, &email).await {
                error!(
                    error = %e,
                    email = safe_email_log(&email),
                    "Failed to send verification email after magic link login"
                );
            }
        });
    }

    let token = issue_session(&state.jwt_secret, &user).map_err(ApiError::from)?;

    Ok(frontend_session_redirect(&state, &token))
}

/// GET /api/v1/auth/github
pub async fn github_start(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Redirect, ApiError> {
    let state = read_state(&state_lock).await;
    let url = state.oauth.github_authorize_url(&login_state());
    info!("Redirecting to GitHub OAuth");
    Ok(Redirect::to(&url))
}

/// GET /api/v1/auth/github/callback?code=...
pub async fn github_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<Redirect, ApiError> {
    let state = read_state(&state_lock).await;
    let code = extract_oauth_code(&params, "GitHub")?;

    let user = authenticate(
        &state.resolver,
        &state.oauth,
        &state.tokens,
        AuthAttempt::Github { code },
    )
    .await
    .map_err(ApiError::from)?;

    let token = issue_session(&state.jwt_secret, &user).map_err(ApiError::from)?;

    Ok(frontend_session_redirect(&state, &token))
}

/// GET /api/v1/auth/google
pub async fn google_start(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Redirect, ApiError> {
    let state = read_state(&state_lock).await;
    let url = state.oauth.google_authorize_url(&login_state());
    info!("Redirecting to Google OAuth");
    Ok(Redirect::to(&url))
}

/// GET /api/v1/auth/google/callback?code=...
pub async fn google_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<Redirect, ApiError> {
    let state = read_state(&state_lock).await;
    let code = extract_oauth_code(&params, "Google")?;

    let user = authenticate(
        &state.resolver,
        &state.oauth,
        &state.tokens,
        AuthAttempt::Google { code },
    )
    .await
    .map_err(ApiError::from)?;

    let token = issue_session(&state.jwt_secret, &user).map_err(ApiError::from)?;

    Ok(frontend_session_redirect(&state, &token))
}

fn extract_oauth_code(
    params: &std::collections::HashMap<String, String>,
    provider: &str,
) -> Result<String, ApiError> {
    if let Some(error) = params.get("error") {
        warn!(oauth_error = %error, provider = provider, "OAuth provider returned error");
        return Err(ApiError::ValidationError(format!(
            "{} did not authorize the sign-in. Please try again.",
            provider
        )));
    }

    params.get("code").cloned().ok_or_else(|| {
        warn!(provider = provider, "OAuth callback missing authorization code");
        ApiError::ValidationError("No authorization code provided".to_string())
    })
}

/// GET /api/v1/email/verify/callback?token=...
///
/// Consumes a verification link. Verifying an already-verified email is a
/// no-op success (an emailed link can legitimately be clicked twice).
pub async fn verify_email_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(query): Query<TokenQuery>,
) -> Result<Response, ApiError> {
    info!("📧 Received email verification callback");
    let state = read_state(&state_lock).await;

    let payload = state
        .tokens
        .verify_for_purpose(&query.token, TokenPurpose::EmailVerification)
        .map_err(|_| ApiError::TokenInvalid)?;

    // the subject is the user the token was minted for; a stale token for
    // a deleted account fails here
    let user = state
        .resolver
        .lookup_by_id(&payload.subject)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::TokenInvalid)?;

    let (_, already_verified) = state
        .resolver
        .mark_email_verified(&user.email)
        .await
        .map_err(ApiError::from)?;

    if already_verified {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    info!(email = safe_email_log(&user.email), "Email verified");

    Ok(Redirect::to(&format!("{}/email-verified", state.frontend_url)).into_response())
}

/// POST /api/v1/email/resend-verification
///
/// Re-sends the verification email for the authenticated user. Responds
/// after a flat delay while the send itself runs in the background.
pub async fn resend_verification(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    session: SessionUser,
) -> Result<Response, ApiError> {
    info!("📧 Received resend verification request");
    let state = read_state(&state_lock).await;

    let user = state
        .resolver
        .lookup_by_id(&session.id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Unauthorized("user not found".to_string()))?;

    let already_verified = user.is_email_verified;

    if !already_verified {
        let verification = state.verification.clone();
        let user_id = user.id.clone();
        let email = user.email.clone();
        tokio::spawn(async move {
            if let Err(e) = verification.send_verification_email(&user_id, &email).await {
                error!(
                    error = %e,
                    email = safe_email_log(&email),
                    "Failed to resend verification email"
                );
            }
        });
    }

    // both branches take the same flat delay
    tokio::time::sleep(Duration::from_millis(TIMING_MASK_DELAY_MS)).await;

    if already_verified {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    Ok(Json(serde_json::json!({
        "message": "Verification email sent. Please check your inbox."
    }))
    .into_response())
}

/// GET /api/v1/user
pub async fn me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    session: SessionUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = read_state(&state_lock).await;

    let user = state
        .resolver
        .lookup_by_id(&session.id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Unauthorized("user not found".to_string()))?;

    Ok(Json(serde_json::json!({ "user": user })))
}

/// DELETE /api/v1/user
///
/// Deletes the account. Outstanding session tokens die with the row: the
/// extractor refuses sessions whose user no longer exists.
pub async fn delete_user(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    session: SessionUser,
) -> Result<StatusCode, ApiError> {
    let state = read_state(&state_lock).await;

    state
        .resolver
        .delete_user(&session.id)
        .await
        .map_err(ApiError::from)?;

    info!(user_id = %session.id, "User account deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/user/logout
///
/// Sessions are stateless bearer tokens, so logout is the client discarding
/// its copy; this endpoint exists so clients have an explicit seam to call.
pub async fn logout_handler(session: SessionUser) -> Result<Json<serde_json::Value>, ApiError> {
    info!(user_id = %session.id, "User logged out");
    Ok(Json(serde_json::json!({
        "message": "Logged out. Please discard the session token."
    })))
}
