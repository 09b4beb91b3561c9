//! Supabase client for the hosted auth and row-query backend.
//!
//! DESIGN
//! ======
//! One `SupabaseClient` per hosted project. It owns the transient session
//! copy (`tokio::sync::RwLock`), a `SessionStore` for persistence between
//! runs, and a `broadcast` channel carrying auth-state changes. Auth
//! endpoints live in `auth.rs`, row queries in `rest.rs`; parsing is kept in
//! free functions so it can be tested without a network.
//!
//! ERROR HANDLING
//! ==============
//! Every remote failure maps to a `SupabaseError`. Callers on the navigation
//! path never surface these; they degrade to the lower-privilege outcome.

pub mod auth;
pub mod rest;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::AuthBackend;
use crate::config::SupabaseConfig;
use crate::store::SessionStore;
use types::{AuthChange, AuthEvent, ProfileRole, Session, SupabaseError, User, parse_error_message};

const EVENT_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<AuthChange>,
}

impl SupabaseClient {
    /// Build a client for one project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project URL is invalid or the HTTP client
    /// fails to build.
    pub fn new(config: &SupabaseConfig, store: Arc<dyn SessionStore>) -> Result<Self, SupabaseError> {
        reqwest::Url::parse(&config.url).map_err(|e| SupabaseError::InvalidUrl(format!("{}: {e}", config.url)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| SupabaseError::HttpClientBuild(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_owned(),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
            store,
            events,
        })
    }

    /// Project base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Subscribe to auth-state changes. Events sent before this call are not
    /// replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    /// Restore a persisted session and announce it as `INITIAL_SESSION`.
    pub async fn initialize(&self) -> Option<Session> {
        let restored = match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "stored session unreadable; starting signed out");
                None
            }
        };
        *self.session.write().await = restored.clone();
        debug!(restored = restored.is_some(), "auth client initialized");
        self.emit(AuthEvent::InitialSession, restored.clone());
        restored
    }

    /// Session as currently held, without a refresh attempt.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// `profiles.select(role).eq(id, user_id).single()`.
    ///
    /// A null role reads as the empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row is missing.
    pub async fn fetch_role(&self, user_id: Uuid) -> Result<String, SupabaseError> {
        let profile: ProfileRole = self
            .from("profiles")
            .select("role")
            .eq("id", user_id)
            .single()
            .await?;
        Ok(profile.role.unwrap_or_default())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Bearer for row queries: the session token, else the anon key.
    pub(crate) async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone())
    }

    pub(crate) async fn set_session(&self, session: Session) {
        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "failed to persist session");
        }
        *self.session.write().await = Some(session);
    }

    pub(crate) async fn clear_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored session");
        }
        *self.session.write().await = None;
    }

    pub(crate) fn emit(&self, event: AuthEvent, session: Option<Session>) {
        debug!(%event, has_session = session.is_some(), "auth state change");
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthChange { event, session });
    }
}

#[async_trait::async_trait]
impl AuthBackend for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>, SupabaseError> {
        SupabaseClient::get_session(self).await
    }

    async fn get_user(&self) -> Result<Option<User>, SupabaseError> {
        SupabaseClient::get_user(self).await
    }

    async fn fetch_role(&self, user_id: Uuid) -> Result<String, SupabaseError> {
        SupabaseClient::fetch_role(self, user_id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        SupabaseClient::subscribe(self)
    }
}

// =============================================================================
// RESPONSE HELPERS
// =============================================================================

pub(crate) fn request_error(e: reqwest::Error) -> SupabaseError {
    SupabaseError::ApiRequest(e.to_string())
}

/// Read a response body, mapping non-2xx statuses to `ApiResponse`.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, SupabaseError> {
    let status = response.status().as_u16();
    let text = response.text().await.map_err(request_error)?;
    if !(200..300).contains(&status) {
        return Err(SupabaseError::ApiResponse { status, message: parse_error_message(&text) });
    }
    Ok(text)
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SupabaseError> {
    let text = read_body(response).await?;
    serde_json::from_str(&text).map_err(|e| SupabaseError::ApiParse(e.to_string()))
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
