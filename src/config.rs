//! Application configuration parsed from environment variables.
//!
//! Both the plain names (`SUPABASE_URL`) and the bundler-prefixed names the
//! web build uses (`VITE_SUPABASE_URL`) are accepted; the plain name wins.

use std::path::PathBuf;
use std::time::Duration;

use crate::navigator::OAuthRecovery;
use crate::role_cache::DEFAULT_ROLE_CACHE_TTL_SECS;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: String },
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Connection settings for one hosted project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub timeouts: HttpTimeouts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub primary: SupabaseConfig,
    pub secondary: Option<SupabaseConfig>,
    pub role_cache_ttl: Duration,
    pub oauth_recovery: OAuthRecovery,
    pub session_file: Option<PathBuf>,
    pub routes_file: Option<PathBuf>,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL` (or `VITE_SUPABASE_URL`)
    /// - `SUPABASE_ANON_KEY` (or `VITE_SUPABASE_ANON_KEY`)
    ///
    /// Optional:
    /// - `SUPABASE_SECONDARY_URL` + `SUPABASE_SECONDARY_ANON_KEY`: both or neither
    /// - `ROLE_CACHE_TTL_SECS`: default 30, `0` disables the cache
    /// - `OAUTH_RECOVERY`: `client` (default) or `reload`
    /// - `SUPABASE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SUPABASE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SESSION_FILE`: persist the session as JSON at this path
    /// - `ROUTES_FILE`: YAML route table replacing the built-in one
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeouts = HttpTimeouts {
            request_secs: env_parse("SUPABASE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse("SUPABASE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        let primary = SupabaseConfig {
            url: require(&["SUPABASE_URL", "VITE_SUPABASE_URL"])?,
            anon_key: require(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"])?,
            timeouts,
        }
        .normalized();

        let secondary_url = env_any(&["SUPABASE_SECONDARY_URL", "VITE_SUPABASE_SECONDARY_URL"]);
        let secondary_key = env_any(&["SUPABASE_SECONDARY_ANON_KEY", "VITE_SUPABASE_SECONDARY_ANON_KEY"]);
        let secondary = match (secondary_url, secondary_key) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig { url, anon_key, timeouts }.normalized()),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing { var: "SUPABASE_SECONDARY_ANON_KEY".into() }),
            (None, Some(_)) => return Err(ConfigError::Missing { var: "SUPABASE_SECONDARY_URL".into() }),
        };

        Ok(Self {
            primary,
            secondary,
            role_cache_ttl: Duration::from_secs(env_parse("ROLE_CACHE_TTL_SECS", DEFAULT_ROLE_CACHE_TTL_SECS)?),
            oauth_recovery: parse_recovery(std::env::var("OAUTH_RECOVERY").ok().as_deref())?,
            session_file: env_any(&["SESSION_FILE"]).map(PathBuf::from),
            routes_file: env_any(&["ROUTES_FILE"]).map(PathBuf::from),
        })
    }
}

impl SupabaseConfig {
    fn normalized(mut self) -> Self {
        self.url = self.url.trim().trim_end_matches('/').to_owned();
        self.anon_key = self.anon_key.trim().to_owned();
        self
    }
}

fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

fn require(keys: &[&str]) -> Result<String, ConfigError> {
    env_any(keys).ok_or_else(|| ConfigError::Missing { var: keys[0].to_owned() })
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Parse(format!("{key} is not a valid number: {raw}"))),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_recovery(raw: Option<&str>) -> Result<OAuthRecovery, ConfigError> {
    match raw.unwrap_or("client") {
        "client" => Ok(OAuthRecovery::ClientSide),
        "reload" => Ok(OAuthRecovery::FullReload),
        other => Err(ConfigError::Parse(format!(
            "unsupported OAUTH_RECOVERY '{other}' (expected 'client' or 'reload')"
        ))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
