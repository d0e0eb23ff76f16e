//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::common::validation::{is_valid_email, ValidationResult, Validator};

/// Canonical user record. One row per human, regardless of how many
/// credential sources they arrive through.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    /// bcrypt hash; present only for local-strategy users. Never serialized.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub github_id: Option<String>,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub is_email_verified: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Fields for creating a user. The id and timestamps are assigned by the
/// repository.
#[derive(Debug, Clone, Default)]
pub struct UserDraft {
    pub email: String,
    pub name: Option<String>,
    pub password: Option<String>,
    pub github_id: Option<String>,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
}

/// Partial update. Absent fields never overwrite existing data, and
/// `is_email_verified` can only be raised, never cleared.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub github_id: Option<String>,
    pub google_id: Option<String>,
    pub is_email_verified: Option<bool>,
}

/// The external identity sources that can link to a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Github,
    Google,
}

impl ProviderKind {
    /// Column holding this provider's link key.
    pub fn column(&self) -> &'static str {
        match self {
            ProviderKind::Github => "github_id",
            ProviderKind::Google => "google_id",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Github => write!(f, "github"),
            ProviderKind::Google => write!(f, "google"),
        }
    }
}

/// Profile fields a provider supplies alongside its link key. Empty strings
/// are normalized to `None` so stale data is never overwritten with nothing.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Only Google asserts this; creation of a new account via Google
    /// requires it to be true.
    pub email_verified: Option<bool>,
}

// ---- Request payloads ----

/// POST /api/v1/auth/signup
#[derive(Deserialize, Debug)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// POST /api/v1/auth/login
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/magic-link
#[derive(Deserialize, Debug)]
pub struct MagicLinkRequest {
    pub email: String,
    pub name: Option<String>,
}

/// `?token=` query parameter shared by the link callbacks.
#[derive(Deserialize, Debug)]
pub struct TokenQuery {
    pub token: String,
}

pub struct SignUpValidator;

impl Validator<SignUpRequest> for SignUpValidator {
    fn validate(&self, data: &SignUpRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !is_valid_email(&data.email) {
            result.add_error("email", "must be a valid email address");
        }
        if data.password.len() < 8 || data.password.len() > 16 {
            result.add_error("password", "must be between 8 and 16 characters");
        }
        if let Some(name) = &data.name {
            if name.trim().is_empty() {
                result.add_error("name", "must not be blank");
            }
        }

        result
    }
}

pub struct MagicLinkValidator;

impl Validator<MagicLinkRequest> for MagicLinkValidator {
    fn validate(&self, data: &MagicLinkRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !is_valid_email(&data.email) {
            result.add_error("email", "must be a valid email address");
        }

        result
    }
}
