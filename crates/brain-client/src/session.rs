//! Session management for the BRAIN API.
//!
//! Exchanges HTTP basic credentials for a cookie-backed session via
//! `POST /authentication`. Login is retried on a fixed interval until a
//! wall-clock budget elapses; the server does not signal session expiry
//! proactively, so a session is only known-good until a request fails.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// BRAIN API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.worldquantbrain.com";

/// Wall-clock budget for the login loop.
const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Sleep between login attempts.
const DEFAULT_LOGIN_RETRY_DELAY: Duration = Duration::from_secs(15);

/// Transport timeout for a single authentication call.
const AUTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while obtaining a session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials file could not be read.
    #[error("failed to read credentials file: {0}")]
    Io(#[from] std::io::Error),

    /// Credentials file is not the expected JSON shape.
    #[error("failed to parse credentials file: {0}")]
    Format(#[from] serde_json::Error),

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// No session was obtained within the login budget.
    #[error("login for {username} timed out after {elapsed:?}")]
    Timeout { username: String, elapsed: Duration },
}

/// HTTP basic credentials for the BRAIN API.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Load credentials from a JSON file: `{"username": ..., "password": ...}`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Body of a successful `POST /authentication` response.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

/// An authenticated BRAIN session.
///
/// Holds a cookie-jar-backed HTTP client; the authentication cookie set by
/// the server authorizes subsequent calls.
#[derive(Debug, Clone)]
pub struct Session {
    http: Client,
    user_id: String,
}

impl Session {
    pub(crate) fn new(http: Client, user_id: String) -> Self {
        Self { http, user_id }
    }

    /// The HTTP client carrying the session cookie.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// User id confirmed at login.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[cfg(test)]
    pub(crate) fn fake(user_id: &str) -> Self {
        Self::new(Client::new(), user_id.to_string())
    }
}

/// Source of fresh sessions.
///
/// The request executor forces a re-login through this trait when it decides
/// the current session has expired.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_in(&self) -> Result<Session, AuthError>;
}

/// Owns the credentials and the bounded login retry loop.
pub struct SessionManager {
    credentials: Credentials,
    base_url: String,
    login_timeout: Duration,
    login_retry_delay: Duration,
}

impl SessionManager {
    /// Create a manager against the production API.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, DEFAULT_BASE_URL.to_string())
    }

    /// Create a manager against a custom base URL.
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Self {
        Self {
            credentials,
            base_url,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            login_retry_delay: DEFAULT_LOGIN_RETRY_DELAY,
        }
    }

    /// Override the login budget and retry interval.
    pub fn with_login_policy(mut self, timeout: Duration, retry_delay: Duration) -> Self {
        self.login_timeout = timeout;
        self.login_retry_delay = retry_delay;
        self
    }

    /// Base URL this manager authenticates against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One authentication call: fresh cookie jar, basic auth, `user.id` check.
    async fn attempt_sign_in(&self) -> Result<Session, reqwest::Error> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(AUTH_REQUEST_TIMEOUT)
            .build()?;

        let response = http
            .post(format!("{}/authentication", self.base_url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?
            .error_for_status()?;

        let auth: AuthResponse = response.json().await?;
        Ok(Session::new(http, auth.user.id))
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    /// Log in, retrying on a fixed interval until the budget elapses.
    ///
    /// Timing out yields `AuthError::Timeout`, an explicit failure value;
    /// callers must treat it as "no session available" and halt dependent
    /// work.
    async fn sign_in(&self) -> Result<Session, AuthError> {
        let start = Instant::now();
        loop {
            match self.attempt_sign_in().await {
                Ok(session) => {
                    info!(user_id = %session.user_id(), "logged in to BRAIN");
                    return Ok(session);
                }
                Err(e) => {
                    let elapsed = start.elapsed();
                    if elapsed >= self.login_timeout {
                        warn!(
                            username = %self.credentials.username,
                            ?elapsed,
                            "login budget exhausted"
                        );
                        return Err(AuthError::Timeout {
                            username: self.credentials.username.clone(),
                            elapsed,
                        });
                    }
                    warn!(error = %e, ?elapsed, "login attempt failed, retrying");
                    tokio::time::sleep(self.login_retry_delay).await;
                }
            }
        }
    }
}
