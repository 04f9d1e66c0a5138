//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! Supports email/password sign-in, account creation for the registration
//! flow, and ID-token refresh.

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::session::{SessionData, DEFAULT_TOKEN_LIFETIME_SECS};

const IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailExists,

    #[error("Password is too weak: {0}")]
    WeakPassword(String),

    #[error("Too many attempts - try again later")]
    TooManyAttempts,

    #[error("This account has been disabled")]
    UserDisabled,

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Authentication failed: {0}")]
    Other(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl AuthError {
    /// Map an Identity Toolkit error message (e.g. `"WEAK_PASSWORD : ..."`).
    pub fn from_firebase_message(message: &str) -> Self {
        let (code, detail) = match message.split_once(" : ") {
            Some((code, detail)) => (code.trim(), detail.trim()),
            None => (message.trim(), ""),
        };
        match code {
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
                AuthError::InvalidCredentials
            }
            "EMAIL_EXISTS" => AuthError::EmailExists,
            "WEAK_PASSWORD" => AuthError::WeakPassword(detail.to_string()),
            "USER_DISABLED" => AuthError::UserDisabled,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => AuthError::SessionExpired,
            c if c.starts_with("TOO_MANY_ATTEMPTS_TRY_LATER") => AuthError::TooManyAttempts,
            other => AuthError::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "returnSecureToken")]
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
struct PasswordResponse {
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    #[serde(rename = "localId")]
    local_id: String,
    email: String,
    #[serde(rename = "expiresIn", default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn parse_lifetime(expires_in: Option<&str>) -> i64 {
    expires_in
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FirebaseAuth {
    client: Client,
    api_key: String,
}

impl FirebaseAuth {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    async fn error_from_response(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => AuthError::from_firebase_message(&envelope.error.message),
            Err(_) => AuthError::Other(format!("Status {}", status)),
        }
    }

    async fn password_call(&self, endpoint: &str, email: &str, password: &str) -> Result<SessionData> {
        let url = format!("{}/accounts:{}", IDENTITY_BASE_URL, endpoint);
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(AuthError::from)
            .with_context(|| format!("Failed to send {} request", endpoint))?;

        if !response.status().is_success() {
            let err = Self::error_from_response(response).await;
            warn!(endpoint, error = %err, "Firebase auth call failed");
            return Err(err.into());
        }

        let parsed: PasswordResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", endpoint))?;

        Ok(SessionData {
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
            uid: parsed.local_id,
            email: parsed.email,
            created_at: Utc::now(),
            expires_in_secs: parse_lifetime(parsed.expires_in.as_deref()),
        })
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionData> {
        let session = self.password_call("signInWithPassword", email, password).await?;
        info!(uid = %session.uid, "Signed in");
        Ok(session)
    }

    /// Create an account; the returned session is signed in as the new user.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SessionData> {
        let session = self.password_call("signUp", email, password).await?;
        info!(uid = %session.uid, "Account created");
        Ok(session)
    }

    /// Exchange the refresh token for a new ID token.
    pub async fn refresh(&self, session: &SessionData) -> Result<SessionData> {
        let response = self
            .client
            .post(SECURE_TOKEN_URL)
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(AuthError::from)
            .context("Failed to send token refresh request")?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await.into());
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .context("Failed to parse token refresh response")?;
        debug!(uid = %parsed.user_id, "Token refreshed");

        Ok(SessionData {
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
            uid: parsed.user_id,
            email: session.email.clone(),
            created_at: Utc::now(),
            expires_in_secs: parse_lifetime(parsed.expires_in.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            AuthError::from_firebase_message("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_firebase_message("EMAIL_EXISTS"),
            AuthError::EmailExists
        ));
        assert!(matches!(
            AuthError::from_firebase_message("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword(ref d) if d == "Password should be at least 6 characters"
        ));
        assert!(matches!(
            AuthError::from_firebase_message(
                "TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been temporarily disabled"
            ),
            AuthError::TooManyAttempts
        ));
        assert!(matches!(
            AuthError::from_firebase_message("SOMETHING_NEW"),
            AuthError::Other(ref c) if c == "SOMETHING_NEW"
        ));
    }

    #[test]
    fn test_parse_password_response() {
        let json = r#"{
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "abc123",
            "email": "dana@unit.il",
            "idToken": "id-token",
            "registered": true,
            "refreshToken": "refresh-token",
            "expiresIn": "3600"
        }"#;
        let parsed: PasswordResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.local_id, "abc123");
        assert_eq!(parse_lifetime(parsed.expires_in.as_deref()), 3600);
    }

    #[test]
    fn test_lifetime_defaults() {
        assert_eq!(parse_lifetime(None), DEFAULT_TOKEN_LIFETIME_SECS);
        assert_eq!(parse_lifetime(Some("soon")), DEFAULT_TOKEN_LIFETIME_SECS);
        assert_eq!(parse_lifetime(Some("1800")), 1800);
    }
}
