//! Session tokens.
//!
//! A session is a signed bearer JWT asserting exactly two things about the
//! caller: the user id and the email. Nothing else from the user row leaks
//! into it, and everything else must be fetched fresh from the database.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::User;
use super::resolver::AuthError;

/// Sessions outlive a working day but not a long weekend.
pub const SESSION_TTL_HOURS: i64 = 72;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
}

/// Sign a session token for an authenticated user.
pub fn issue_session(secret: &str, user: &User) -> Result<String, AuthError> {
    let claims = SessionClaims {
        sub: user.id.clone(),
        email: user.email.clone(),
        exp: (Utc::now() + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Infrastructure(format!("session signing failed: {}", e)))
}

/// Decode and verify a session token. Returns `None` on any failure.
pub fn decode_session(secret: &str, token: &str) -> Option<SessionClaims> {
    let validation = Validation::new(Algorithm::HS256);

    match decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!(error = %e, "Session token rejected");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: "a@x.com".to_string(),
            name: Some("A".to_string()),
            password: None,
            github_id: None,
            google_id: None,
            avatar_url: None,
            is_email_verified: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_session_round_trip() {
        let u = user();
        let token = issue_session("secret", &u).unwrap();
        let claims = decode_session("secret", &token).expect("session should decode");

        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.email, u.email);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_session_rejects_wrong_secret() {
        let token = issue_session("secret", &user()).unwrap();
        assert!(decode_session("other", &token).is_none());
    }

    #[test]
    fn test_session_rejects_garbage() {
        assert!(decode_session("secret", "not.a.jwt").is_none());
        assert!(decode_session("secret", "").is_none());
    }
}
