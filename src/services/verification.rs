// src/services/verification.rs
//! Composes purpose-scoped tokens with outbound email: verification links
//! and magic links both live here so every emailed link is built the same
//! way and lands on a backend callback.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::common::helpers::safe_email_log;
use crate::common::validation::is_valid_email;

use super::email::{EmailError, EmailKind, Mailer};
use super::tokens::{TokenClaims, TokenError, TokenPurpose, TokenService};

/// Verification links stay valid for a day.
pub const VERIFICATION_TTL_HOURS: i64 = 24;

/// Magic links are short-lived: long enough to open an inbox, no longer.
pub const MAGIC_LINK_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Email(#[from] EmailError),

    /// Callers validate recipient addresses before they reach this service,
    /// so tripping this is our bug, not bad input.
    #[error("recipient address is malformed")]
    Recipient,
}

/// Who a magic link is being minted for.
#[derive(Debug)]
pub enum MagicLinkTarget {
    /// No account yet: the token carries the email and optional name the
    /// account will be created with, under a placeholder subject.
    SignUp { email: String, name: Option<String> },

    /// Existing account: the token subject is pinned to the user id.
    Login { user_id: String, email: String },
}

pub struct VerificationService {
    tokens: Arc<TokenService>,
    mailer: Arc<dyn Mailer>,
    backend_url: String,
}

impl VerificationService {
    pub fn new(tokens: Arc<TokenService>, mailer: Arc<dyn Mailer>, backend_url: String) -> Self {
        Self {
            tokens,
            mailer,
            backend_url,
        }
    }

    /// Email a verification link to `email`, bound to user `user_id`.
    pub async fn send_verification_email(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<(), VerificationError> {
        if !is_valid_email(email) {
            return Err(VerificationError::Recipient);
        }

        // the subject is the whole payload: the callback resolves the user
        // by id, so the token carries no claims beyond its purpose
        let token = self.tokens.issue(
            user_id,
            TokenPurpose::EmailVerification,
            Duration::hours(VERIFICATION_TTL_HOURS),
            TokenClaims::bare(TokenPurpose::EmailVerification),
        )?;

        let link = format!(
            "{}/api/v1/email/verify/callback?token={}",
            self.backend_url,
            urlencoding::encode(&token)
        );

        let kind = EmailKind::Verification;
        self.mailer
            .send(email, kind.subject(), &kind.render(&link))
            .await?;

        info!(email = safe_email_log(email), "Verification email sent");

        Ok(())
    }

    /// Email a magic link for sign-up or login.
    pub async fn send_magic_link(&self, target: MagicLinkTarget) -> Result<(), VerificationError> {
        let (subject_id, purpose, kind, email, name) = match target {
            MagicLinkTarget::SignUp { email, name } => (
                // the account does not exist yet, so the subject is a
                // placeholder that only has to be well-formed
                Uuid::new_v4().to_string(),
                TokenPurpose::MagicLinkSignUp,
                EmailKind::SignUpMagicLink,
                email,
                name,
            ),
            MagicLinkTarget::Login { user_id, email } => (
                user_id,
                TokenPurpose::MagicLinkLogin,
                EmailKind::LoginMagicLink,
                email,
                None,
            ),
        };

        if !is_valid_email(&email) {
            return Err(VerificationError::Recipient);
        }

        let claims = TokenClaims {
            purpose,
            email: Some(email.clone()),
            name,
        };

        let token = self.tokens.issue(
            &subject_id,
            purpose,
            Duration::minutes(MAGIC_LINK_TTL_MINUTES),
            claims,
        )?;

        let link = format!(
            "{}/api/v1/auth/magic-link/callback?token={}",
            self.backend_url,
            urlencoding::encode(&token)
        );

        self.mailer
            .send(&email, kind.subject(), &kind.render(&link))
            .await?;

        info!(
            email = safe_email_log(&email),
            purpose = ?purpose,
            "Magic link sent"
        );

        Ok(())
    }
}
