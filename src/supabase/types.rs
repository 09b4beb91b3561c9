//! Wire types shared by the auth and row-query clients.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Refresh a session this many seconds before it actually expires.
pub const EXPIRY_MARGIN_SECS: i64 = 10;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by the hosted backend client.
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    /// The project URL could not be parsed or joined.
    #[error("invalid project URL: {0}")]
    InvalidUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The HTTP request failed before a response arrived (including timeouts).
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The service answered with a non-success status.
    #[error("API response error: status {status}: {message}")]
    ApiResponse { status: u16, message: String },

    /// The response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The operation needs a session and there is none.
    #[error("not signed in")]
    NotAuthenticated,

    /// The OAuth provider redirected back with an error.
    #[error("oauth callback error: {error}: {description}")]
    OAuthCallback { error: String, description: String },
}

impl SupabaseError {
    /// HTTP status of a remote rejection, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Reduce a remote error body to a single human-readable message.
///
/// Auth endpoints answer with `error_description` or `msg`; row queries with
/// `message`. Anything else falls back to the raw body.
#[must_use]
pub fn parse_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_owned();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map_or_else(|| body.trim().to_owned(), str::to_owned)
}

// =============================================================================
// USER + SESSION
// =============================================================================

/// Identity returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
}

impl User {
    /// Best display name: `full_name`, then `name` metadata, then email.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        ["full_name", "name"]
            .iter()
            .find_map(|key| self.user_metadata.get(key).and_then(serde_json::Value::as_str))
            .or(self.email.as_deref())
    }
}

/// Token bundle issued by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the service omitted it.
    #[must_use]
    pub fn with_expiry_from(mut self, now: i64) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(now + self.expires_in);
        }
        self
    }

    /// Whether the access token expires within the refresh margin.
    #[must_use]
    pub fn is_expiring_at(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at - now <= EXPIRY_MARGIN_SECS)
    }
}

pub(crate) fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Result of a sign-up: the user always, a session only when the project
/// auto-confirms new accounts.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: User,
    pub session: Option<Session>,
}

// =============================================================================
// AUTH EVENTS
// =============================================================================

/// Lifecycle events emitted on the auth-state stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification on the auth-state stream.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

// =============================================================================
// ROW TYPES
// =============================================================================

/// `profiles.role` projection. A null role is "no role".
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRole {
    #[serde(default)]
    pub role: Option<String>,
}
