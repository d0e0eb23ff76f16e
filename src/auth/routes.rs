//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/v1/auth/signup` - Local account registration
/// - `POST /api/v1/auth/login` - Email/password login
/// - `POST /api/v1/auth/magic-link` - Request a magic sign-in link
/// - `GET  /api/v1/auth/magic-link/callback` - Consume a magic link
/// - `GET  /api/v1/auth/github` + `/callback` - GitHub OAuth flow
/// - `GET  /api/v1/auth/google` + `/callback` - Google OAuth flow
/// - `GET  /api/v1/email/verify/callback` - Consume a verification link
/// - `POST /api/v1/email/resend-verification` - Re-send verification email
/// - `GET  /api/v1/user` - Current user
/// - `DELETE /api/v1/user` - Delete account
/// - `GET  /api/v1/user/logout` - Logout (client-side token removal)
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/v1/auth/signup", post(handlers::signup))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/magic-link", post(handlers::request_magic_link))
        .route(
            "/api/v1/auth/magic-link/callback",
            get(handlers::magic_link_callback),
        )
        .route("/api/v1/auth/github", get(handlers::github_start))
        .route(
            "/api/v1/auth/github/callback",
            get(handlers::github_callback),
        )
        .route("/api/v1/auth/google", get(handlers::google_start))
        .route(
            "/api/v1/auth/google/callback",
            get(handlers::google_callback),
        )
        .route(
            "/api/v1/email/verify/callback",
            get(handlers::verify_email_callback),
        )
        .route(
            "/api/v1/email/resend-verification",
            post(handlers::resend_verification),
        )
        .route(
            "/api/v1/user",
            get(handlers::me_handler).delete(handlers::delete_user),
        )
        .route("/api/v1/user/logout", get(handlers::logout_handler))
}
