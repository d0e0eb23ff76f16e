// src/services/tokens.rs
//! Purpose-scoped bearer tokens for email verification and magic links.
//!
//! Tokens are signed (not encrypted) JWTs bound to a subject, this backend
//! as issuer, the frontend as audience, and exactly one purpose. A token
//! minted for one purpose is never accepted for another.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Signing failed or the subject was unusable. Infrastructure failure,
    /// not a user error.
    #[error("token signing failed: {0}")]
    Issuance(String),

    /// Any verification failure: bad signature, expired, wrong
    /// issuer/audience, malformed payload, wrong purpose. Deliberately
    /// carries no detail so callers cannot tell which check failed.
    #[error("token is expired or invalid")]
    Invalid,
}

/// The single workflow a token is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenPurpose {
    EmailVerification,
    MagicLinkSignUp,
    MagicLinkLogin,
}

/// Application claim bag carried next to the standard JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub purpose: TokenPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TokenClaims {
    pub fn bare(purpose: TokenPurpose) -> Self {
        Self {
            purpose,
            email: None,
            name: None,
        }
    }
}

/// Wire shape of the signed token.
#[derive(Debug, Serialize, Deserialize)]
struct JwtPayload {
    sub: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
    claims: TokenClaims,
}

/// Verified token contents handed back to callers.
#[derive(Debug, Clone)]
pub struct TokenPayload {
    pub subject: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub claims: TokenClaims,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenService {
    pub fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Sign a token for `subject`, scoped to `purpose`, expiring after `ttl`.
    ///
    /// The subject must be a UUID (a user id, or a freshly minted placeholder
    /// for not-yet-existing sign-up subjects).
    pub fn issue(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
        claims: TokenClaims,
    ) -> Result<String, TokenError> {
        if Uuid::parse_str(subject).is_err() {
            return Err(TokenError::Issuance(format!(
                "subject is not a valid id: {:?}",
                subject
            )));
        }
        if claims.purpose != purpose {
            return Err(TokenError::Issuance(
                "claims purpose does not match requested purpose".to_string(),
            ));
        }

        let now = Utc::now();
        let payload = JwtPayload {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            claims,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &self.encoding_key,
        )
        .map_err(|e| TokenError::Issuance(e.to_string()))
    }

    /// Verify a token string and return its payload.
    ///
    /// Every failure mode collapses into [`TokenError::Invalid`]; the real
    /// cause is only logged at debug level.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        // expiry is checked below with a strict comparison instead of the
        // library default (60 seconds of leeway would keep short-lived
        // magic-link tokens alive well past their TTL)
        validation.validate_exp = false;

        let data = decode::<JwtPayload>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "Token verification failed");
            TokenError::Invalid
        })?;

        let payload = data.claims;

        if payload.exp <= Utc::now().timestamp() {
            debug!(expires_at = payload.exp, "Token verification failed: expired");
            return Err(TokenError::Invalid);
        }

        if Uuid::parse_str(&payload.sub).is_err() {
            debug!("Token verification failed: subject is not a valid id");
            return Err(TokenError::Invalid);
        }

        Ok(TokenPayload {
            subject: payload.sub,
            issued_at: payload.iat,
            expires_at: payload.exp,
            claims: payload.claims,
        })
    }

    /// Verify a token and additionally require it to carry `expected`.
    /// Cross-purpose use is indistinguishable from any other invalid token.
    pub fn verify_for_purpose(
        &self,
        token: &str,
        expected: TokenPurpose,
    ) -> Result<TokenPayload, TokenError> {
        let payload = self.verify(token)?;

        if payload.claims.purpose != expected {
            debug!(
                expected = ?expected,
                actual = ?payload.claims.purpose,
                "Token verification failed: purpose mismatch"
            );
            return Err(TokenError::Invalid);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            "test_secret_key",
            "http://localhost:8080",
            "http://localhost:5173",
        )
    }

    fn subject() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let tokens = service();
        let sub = subject();

        let claims = TokenClaims {
            purpose: TokenPurpose::MagicLinkSignUp,
            email: Some("a@x.com".to_string()),
            name: Some("A".to_string()),
        };

        let token = tokens
            .issue(&sub, TokenPurpose::MagicLinkSignUp, Duration::minutes(10), claims)
            .expect("issue should succeed");

        let payload = tokens.verify(&token).expect("verify should succeed");
        assert_eq!(payload.subject, sub);
        assert_eq!(payload.claims.purpose, TokenPurpose::MagicLinkSignUp);
        assert_eq!(payload.claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(payload.claims.name.as_deref(), Some("A"));
        assert!(payload.expires_at > payload.issued_at);
    }

    #[test]
    fn test_issue_rejects_malformed_subject() {
        let tokens = service();
        let result = tokens.issue(
            "not-a-uuid",
            TokenPurpose::EmailVerification,
            Duration::days(1),
            TokenClaims::bare(TokenPurpose::EmailVerification),
        );
        assert!(matches!(result, Err(TokenError::Issuance(_))));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let tokens = service();
        let other = TokenService::new(
            "different_secret",
            "http://localhost:8080",
            "http://localhost:5173",
        );

        let token = tokens
            .issue(
                &subject(),
                TokenPurpose::EmailVerification,
                Duration::days(1),
                TokenClaims::bare(TokenPurpose::EmailVerification),
            )
            .unwrap();

        assert!(matches!(other.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_verify_rejects_wrong_audience() {
        let tokens = service();
        let other = TokenService::new(
            "test_secret_key",
            "http://localhost:8080",
            "http://evil.example.com",
        );

        let token = tokens
            .issue(
                &subject(),
                TokenPurpose::EmailVerification,
                Duration::days(1),
                TokenClaims::bare(TokenPurpose::EmailVerification),
            )
            .unwrap();

        assert!(matches!(other.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let tokens = service();
        assert!(matches!(tokens.verify("not.a.jwt"), Err(TokenError::Invalid)));
        assert!(matches!(tokens.verify(""), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_short_ttl_token_expires() {
        let tokens = service();
        let token = tokens
            .issue(
                &subject(),
                TokenPurpose::MagicLinkLogin,
                Duration::milliseconds(1),
                TokenClaims::bare(TokenPurpose::MagicLinkLogin),
            )
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));

        assert!(matches!(tokens.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_purpose_isolation() {
        let tokens = service();
        let sub = subject();

        let login_token = tokens
            .issue(
                &sub,
                TokenPurpose::MagicLinkLogin,
                Duration::minutes(10),
                TokenClaims::bare(TokenPurpose::MagicLinkLogin),
            )
            .unwrap();
        let verification_token = tokens
            .issue(
                &sub,
                TokenPurpose::EmailVerification,
                Duration::days(1),
                TokenClaims::bare(TokenPurpose::EmailVerification),
            )
            .unwrap();

        // each consumer rejects the other's token, well before expiry
        assert!(matches!(
            tokens.verify_for_purpose(&login_token, TokenPurpose::EmailVerification),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            tokens.verify_for_purpose(&verification_token, TokenPurpose::MagicLinkLogin),
            Err(TokenError::Invalid)
        ));

        // and accepts its own
        assert!(tokens
            .verify_for_purpose(&login_token, TokenPurpose::MagicLinkLogin)
            .is_ok());
        assert!(tokens
            .verify_for_purpose(&verification_token, TokenPurpose::EmailVerification)
            .is_ok());
    }

    #[test]
    fn test_purpose_serialization_matches_wire_names() {
        assert_eq!(
            serde_json::to_string(&TokenPurpose::EmailVerification).unwrap(),
            "\"email-verification\""
        );
        assert_eq!(
            serde_json::to_string(&TokenPurpose::MagicLinkSignUp).unwrap(),
            "\"magic-link-sign-up\""
        );
        assert_eq!(
            serde_json::to_string(&TokenPurpose::MagicLinkLogin).unwrap(),
            "\"magic-link-login\""
        );
    }
}
