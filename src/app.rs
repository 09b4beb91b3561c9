//! Startup wiring: client, guard, navigator, and the auth listener.
//!
//! `App::start` mirrors what a browser does on page load: install the
//! listener, restore the stored session, consume an OAuth callback left in
//! the address bar, then run the initial navigation through the guard.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bootstrap::{self, AuthSubscription};
use crate::config::{AppConfig, ConfigError, SupabaseConfig};
use crate::guard::NavigationGuard;
use crate::location::{Location, MemoryHistory};
use crate::navigator::{NavOutcome, NavigationError, Navigator};
use crate::role_cache::RoleCache;
use crate::routes::{RouteTable, RouteTableError};
use crate::store::{FileStore, MemoryStore, SessionStore};
use crate::supabase::SupabaseClient;
use crate::supabase::types::{Session, SignUpOutcome, SupabaseError, User};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("route table error: {0}")]
    Routes(#[from] RouteTableError),
    #[error(transparent)]
    Supabase(#[from] SupabaseError),
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),
}

pub struct App {
    client: Arc<SupabaseClient>,
    navigator: Arc<Navigator<MemoryHistory>>,
    subscription: AuthSubscription,
}

impl App {
    /// Wire everything for `project` and settle the initial navigation at
    /// `initial` (a path or a full redirect URL).
    ///
    /// # Errors
    ///
    /// Returns an error if the route table or client cannot be built, or the
    /// initial navigation loops.
    pub async fn start(config: &AppConfig, project: &SupabaseConfig, initial: &str) -> Result<Self, AppError> {
        let routes = match &config.routes_file {
            Some(path) => RouteTable::load(path)?,
            None => RouteTable::default(),
        };
        let store: Arc<dyn SessionStore> = match &config.session_file {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::default()),
        };
        let client = Arc::new(SupabaseClient::new(project, store)?);
        let guard = NavigationGuard::new(client.clone(), Arc::new(routes), RoleCache::new(config.role_cache_ttl));

        let landing = Location::parse(initial);
        let navigator = Arc::new(Navigator::new(
            MemoryHistory::new(landing.clone()),
            guard,
            config.oauth_recovery,
        ));
        let subscription = bootstrap::install(&*client, navigator.clone());
        let app = Self { client, navigator, subscription };

        let before = app.subscription.handled();
        let mut emitted = 0;
        app.client.initialize().await;
        emitted += 1;
        match app.client.session_from_url(&landing).await {
            Ok(Some(_)) => emitted += 1,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "oauth callback not consumed"),
        }
        app.settle(before + emitted).await;

        let here = app.navigator.current().await;
        let outcome = app.navigator.navigate(&here.to_string()).await?;
        info!(project = %app.client.url(), location = %outcome.committed, "app started");
        Ok(app)
    }

    #[must_use]
    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator<MemoryHistory> {
        &self.navigator
    }

    /// Location currently shown.
    pub async fn location(&self) -> Location {
        self.navigator.current().await
    }

    /// User navigation to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the guard keeps redirecting.
    pub async fn visit(&self, target: &str) -> Result<NavOutcome, AppError> {
        Ok(self.navigator.navigate(target).await?)
    }

    /// Password sign-in; returns once the listener has reacted.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are malformed or rejected.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let (email, password) =
            crate::helpers::validate_credentials(email, password).map_err(AppError::InvalidCredentials)?;
        let before = self.subscription.handled();
        let session = self.client.sign_in_with_password(&email, &password).await?;
        self.settle(before + 1).await;
        Ok(session)
    }

    /// Register an account; signs in when the project auto-confirms.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are malformed or rejected.
    pub async fn sign_up(&self, email: &str, password: &str, full_name: Option<&str>) -> Result<SignUpOutcome, AppError> {
        let (email, password) =
            crate::helpers::validate_credentials(email, password).map_err(AppError::InvalidCredentials)?;
        let metadata = full_name.map(|name| serde_json::json!({ "full_name": name.trim() }));
        let before = self.subscription.handled();
        let outcome = self.client.sign_up(&email, &password, metadata).await?;
        if outcome.session.is_some() {
            self.settle(before + 1).await;
        }
        Ok(outcome)
    }

    /// Sign out; returns once the listener has reacted.
    pub async fn sign_out(&self) {
        let before = self.subscription.handled();
        self.client.sign_out().await;
        self.settle(before + 1).await;
    }

    /// Identity behind the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn whoami(&self) -> Result<Option<User>, AppError> {
        Ok(self.client.get_user().await?)
    }

    /// Stop the auth listener.
    pub async fn shutdown(self) {
        self.subscription.shutdown().await;
    }

    async fn settle(&self, count: u64) {
        if !self.subscription.wait_for(count).await {
            warn!(count, "auth listener stopped before settling");
        }
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
