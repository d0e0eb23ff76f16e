// src/services/oauth.rs
//! OAuth2 code exchange against GitHub and Google.
//!
//! This service owns the provider endpoints and the HTTP plumbing; it hands
//! back raw provider profiles and leaves interpretation (link keys, email
//! requirements) to the credential strategies.

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Debug, Error)]
pub enum OAuthError {
    /// The provider rejected the authorization code or the user denied
    /// access. Message is safe to show the user.
    #[error("{0}")]
    Denied(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("profile fetch failed: {0}")]
    Profile(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubProfile {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Random CSRF state for the authorize redirect.
pub fn login_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub struct OAuthClient {
    client: Client,
    github_client_id: String,
    github_client_secret: String,
    google_client_id: String,
    google_client_secret: String,
    backend_url: String,
}

impl OAuthClient {
    pub fn new(
        client: Client,
        github_client_id: String,
        github_client_secret: String,
        google_client_id: String,
        google_client_secret: String,
        backend_url: String,
    ) -> Self {
        Self {
            client,
            github_client_id,
            github_client_secret,
            google_client_id,
            google_client_secret,
            backend_url,
        }
    }

    fn github_redirect_uri(&self) -> String {
        format!("{}/api/v1/auth/github/callback", self.backend_url)
    }

    fn google_redirect_uri(&self) -> String {
        format!("{}/api/v1/auth/google/callback", self.backend_url)
    }

    pub fn github_authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}",
            GITHUB_AUTHORIZE_URL,
            self.github_client_id,
            urlencoding::encode(&self.github_redirect_uri()),
            urlencoding::encode("read:user user:email"),
            state
        )
    }

    pub fn google_authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            GOOGLE_AUTHORIZE_URL,
            self.google_client_id,
            urlencoding::encode(&self.google_redirect_uri()),
            urlencoding::encode("openid email profile"),
            state
        )
    }

    /// Exchange a GitHub callback code for the user's profile.
    pub async fn github_exchange(&self, code: &str) -> Result<GithubProfile, OAuthError> {
        let params = [
            ("client_id", self.github_client_id.as_str()),
            ("client_secret", self.github_client_secret.as_str()),
            ("code", code),
            ("redirect_uri", &self.github_redirect_uri()),
        ];

        // GitHub answers form-encoded unless asked for JSON
        let response = self
            .client
            .post(GITHUB_TOKEN_URL)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OAuthError::Exchange(format!(
                "GitHub token endpoint returned {}",
                status
            )));
        }

        // GitHub reports bad codes as 200 OK with an "error" field
        let json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| OAuthError::Exchange(format!("invalid JSON from GitHub: {}", e)))?;

        if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
            let description = json
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or("authorization was not granted");
            debug!(error = %error, "GitHub code exchange rejected");
            return Err(OAuthError::Denied(description.to_string()));
        }

        let token: TokenResponse = serde_json::from_value(json)
            .map_err(|e| OAuthError::Exchange(format!("unexpected GitHub response: {}", e)))?;

        // the profile email is the public one only; a hidden email is the
        // user's choice and surfaces as an actionable error downstream
        let profile: GithubProfile = self
            .client
            .get(GITHUB_USER_URL)
            .header("User-Agent", "auth_api")
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| OAuthError::Profile(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::Profile(e.to_string()))?;

        info!(login = %profile.login, "GitHub profile fetched");

        Ok(profile)
    }

    /// Exchange a Google callback code for the user's profile.
    pub async fn google_exchange(&self, code: &str) -> Result<GoogleProfile, OAuthError> {
        let params = [
            ("client_id", self.google_client_id.as_str()),
            ("client_secret", self.google_client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.google_redirect_uri()),
        ];

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            debug!(status = %status, "Google code exchange rejected");
            return Err(OAuthError::Denied(
                "Google did not accept the sign-in. Please try again.".to_string(),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(format!("unexpected Google response: {}", e)))?;

        let profile: GoogleProfile = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| OAuthError::Profile(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::Profile(e.to_string()))?;

        info!("Google profile fetched");

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new(
            Client::new(),
            "gh-id".to_string(),
            "gh-secret".to_string(),
            "goog-id".to_string(),
            "goog-secret".to_string(),
            "http://localhost:8080".to_string(),
        )
    }

    #[test]
    fn test_github_authorize_url_shape() {
        let url = client().github_authorize_url("abc123");
        assert!(url.starts_with(GITHUB_AUTHORIZE_URL));
        assert!(url.contains("client_id=gh-id"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains(&urlencoding::encode(
            "http://localhost:8080/api/v1/auth/github/callback"
        ).into_owned()));
    }

    #[test]
    fn test_google_authorize_url_shape() {
        let url = client().google_authorize_url("abc123");
        assert!(url.starts_with(GOOGLE_AUTHORIZE_URL));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("openid%20email%20profile"));
    }

    #[test]
    fn test_login_state_is_random_and_urlsafe() {
        let a = login_state();
        let b = login_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
