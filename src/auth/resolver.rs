//! Identity resolution: every credential source funnels into one of the
//! resolver's entry points, and each entry point returns the single
//! canonical [`User`] row the credential maps to.
//!
//! Linking rules:
//! - a provider id that is already linked wins over everything else
//! - otherwise a case-insensitive email match adopts the provider id
//! - otherwise a new user is created
//!
//! Creation races are settled by the unique constraints in the schema: on a
//! violation the resolver re-reads once and links against whichever row won.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::common::error::{ApiError, INVALID_CREDENTIALS_MESSAGE};
use crate::common::helpers::safe_email_log;
use crate::services::oauth::OAuthError;
use crate::services::tokens::TokenError;

use super::models::{ProfileFields, ProviderKind, User, UserDraft, UserPatch};
use super::repo::{RepoError, UserRepository};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Input failed a format or precondition check. Message is user-facing.
    #[error("{0}")]
    Validation(String),

    /// Email/password pair rejected. Carries no detail by construction:
    /// unknown email and wrong password produce this same value.
    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    Credential,

    /// The request is valid but collides with existing state.
    #[error("{0}")]
    Conflict(String),

    /// A link token failed verification, whatever the reason.
    #[error("link token rejected")]
    TokenInvalid,

    #[error("{0}")]
    NotFound(String),

    /// Internal failure. Message is for logs, never for responses.
    #[error("{0}")]
    Infrastructure(String),
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            // a violation that escapes the resolver's own retry handling is
            // a genuine conflict with existing state
            RepoError::UniqueViolation => {
                AuthError::Conflict("Account already exists".to_string())
            }
            RepoError::Database(e) => AuthError::Infrastructure(e.to_string()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Issuance(msg) => AuthError::Infrastructure(msg),
            TokenError::Invalid => AuthError::TokenInvalid,
        }
    }
}

impl From<OAuthError> for AuthError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Denied(msg) => AuthError::Validation(msg),
            other => AuthError::Infrastructure(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => ApiError::ValidationError(msg),
            AuthError::Credential => ApiError::Credential,
            AuthError::Conflict(msg) => ApiError::Conflict(msg),
            AuthError::TokenInvalid => ApiError::TokenInvalid,
            AuthError::NotFound(msg) => ApiError::NotFound(msg),
            AuthError::Infrastructure(msg) => ApiError::Infrastructure(msg),
        }
    }
}

pub struct IdentityResolver {
    repo: Arc<dyn UserRepository>,
}

impl IdentityResolver {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.repo.find_by_email(email).await?)
    }

    pub async fn lookup_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    /// Resolve an email/password pair to its user.
    ///
    /// All rejection paths collapse into [`AuthError::Credential`]: no
    /// caller can distinguish an unregistered email from a wrong password
    /// or from a provider-only account that has no password at all.
    pub async fn resolve_by_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or(AuthError::Credential)?;

        let hash = user.password.as_deref().ok_or(AuthError::Credential)?;

        let matches = bcrypt::verify(password, hash)
            .map_err(|e| AuthError::Infrastructure(format!("password verify failed: {}", e)))?;

        if !matches {
            return Err(AuthError::Credential);
        }

        Ok(user)
    }

    /// Resolve a provider identity to a user, linking or creating as needed.
    ///
    /// Precedence: existing provider link, then email match, then creation.
    /// The fast path is read-only; profile fields are only written at link
    /// time, absent fields never erase stored data, and the local password
    /// is never touched.
    pub async fn resolve_or_link_provider(
        &self,
        provider: ProviderKind,
        provider_id: &str,
        email: &str,
        profile: ProfileFields,
    ) -> Result<User, AuthError> {
        // repeat login: the link already exists, nothing to write
        if let Some(user) = self.repo.find_by_provider_id(provider, provider_id).await? {
            return Ok(user);
        }

        if let Some(user) = self.link_to_email(provider, provider_id, email, &profile).await? {
            return Ok(user);
        }

        // first contact through this provider: create the row
        match self.create_from_provider(provider, provider_id, email, &profile).await {
            Ok(user) => Ok(user),
            Err(AuthError::Conflict(_)) => {
                // lost a first-contact race; whoever won owns the email or
                // the provider id now, so re-read once and link against it
                warn!(
                    provider = %provider,
                    email = safe_email_log(email),
                    "Creation race detected, retrying as link"
                );

                if let Some(user) =
                    self.repo.find_by_provider_id(provider, provider_id).await?
                {
                    return Ok(user);
                }
                if let Some(user) =
                    self.link_to_email(provider, provider_id, email, &profile).await?
                {
                    return Ok(user);
                }

                Err(AuthError::Infrastructure(
                    "creation race retry found no winning row".to_string(),
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve an email to its user, creating a bare row when none exists.
    /// Returns the user and whether it was created by this call.
    pub async fn resolve_or_create_by_email(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<(User, bool), AuthError> {
        if let Some(user) = self.repo.find_by_email(email).await? {
            return Ok((user, false));
        }

        let draft = UserDraft {
            email: email.to_string(),
            name: name.map(str::to_string),
            ..Default::default()
        };

        match self.repo.create(draft).await {
            Ok(user) => {
                info!(email = safe_email_log(email), "Created user");
                Ok((user, true))
            }
            Err(RepoError::UniqueViolation) => {
                // a concurrent request created this email first
                let user = self.repo.find_by_email(email).await?.ok_or_else(|| {
                    AuthError::Infrastructure(
                        "creation race retry found no winning row".to_string(),
                    )
                })?;
                Ok((user, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register a local account: hashes the password and creates the row.
    /// The email must not already be taken by any credential source.
    pub async fn register_local(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, AuthError> {
        if self.repo.find_by_email(email).await?.is_some() {
            return Err(AuthError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::Infrastructure(format!("password hash failed: {}", e)))?;

        let draft = UserDraft {
            email: email.to_string(),
            name: name.map(str::to_string),
            password: Some(hash),
            ..Default::default()
        };

        match self.repo.create(draft).await {
            Ok(user) => {
                info!(email = safe_email_log(email), "Registered local user");
                Ok(user)
            }
            Err(RepoError::UniqueViolation) => Err(AuthError::Conflict(
                "User with this email already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Raise the verification flag on a user's email. Idempotent; reports
    /// whether the flag was already set.
    pub async fn mark_email_verified(&self, email: &str) -> Result<(User, bool), AuthError> {
        let existing = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        if existing.is_email_verified {
            return Ok((existing, true));
        }

        let updated = self
            .repo
            .update_by_email(
                email,
                UserPatch {
                    is_email_verified: Some(true),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| {
                AuthError::Infrastructure("user disappeared during verification".to_string())
            })?;

        Ok((updated, false))
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), AuthError> {
        Ok(self.repo.delete(id).await?)
    }

    async fn link_to_email(
        &self,
        provider: ProviderKind,
        provider_id: &str,
        email: &str,
        profile: &ProfileFields,
    ) -> Result<Option<User>, AuthError> {
        if self.repo.find_by_email(email).await?.is_none() {
            return Ok(None);
        }

        info!(
            provider = %provider,
            email = safe_email_log(email),
            "Linking provider to existing user"
        );

        let patch = Self::profile_patch(provider, provider_id, profile);
        Ok(self.repo.update_by_email(email, patch).await?)
    }

    async fn create_from_provider(
        &self,
        provider: ProviderKind,
        provider_id: &str,
        email: &str,
        profile: &ProfileFields,
    ) -> Result<User, AuthError> {
        // a provider may assert the email is unverified on its side; such an
        // identity can link to an existing row but never mint a new one
        if profile.email_verified == Some(false) {
            return Err(AuthError::Validation(
                "Email address is not verified with the provider".to_string(),
            ));
        }

        let mut draft = UserDraft {
            email: email.to_string(),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
            ..Default::default()
        };
        match provider {
            ProviderKind::Github => draft.github_id = Some(provider_id.to_string()),
            ProviderKind::Google => draft.google_id = Some(provider_id.to_string()),
        }

        let user = self.repo.create(draft).await.map_err(|e| match e {
            RepoError::UniqueViolation => AuthError::Conflict("race".to_string()),
            other => AuthError::from(other),
        })?;

        info!(
            provider = %provider,
            email = safe_email_log(email),
            "Created user from provider identity"
        );

        Ok(user)
    }

    // only the verification callback flips is_email_verified, so a link
    // patch carries the provider id and profile fields and nothing else
    fn profile_patch(
        provider: ProviderKind,
        provider_id: &str,
        profile: &ProfileFields,
    ) -> UserPatch {
        let mut patch = UserPatch {
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
            ..Default::default()
        };
        match provider {
            ProviderKind::Github => patch.github_id = Some(provider_id.to_string()),
            ProviderKind::Google => patch.google_id = Some(provider_id.to_string()),
        }
        patch
    }
}
