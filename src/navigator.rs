//! Navigator: the single point where redirect decisions are made.
//!
//! DESIGN
//! ======
//! The history sits behind one async mutex. User navigation
//! (`navigate`) and auth-state reactions (`handle_auth_change`) both take
//! it for their whole duration, guard round trips included, so a listener
//! redirect can never interleave with a guard redirect.
//!
//! Every committed transition is followed by a scrub that replaces the
//! visible entry with its bare path.

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::guard::{GuardDecision, NavigationGuard, RedirectReason};
use crate::location::{History, Location};
use crate::supabase::types::{AuthChange, AuthEvent};

/// Redirect hops followed before a navigation is abandoned.
pub const MAX_REDIRECTS: usize = 4;

/// How a leftover OAuth signature is cleared after sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthRecovery {
    /// Replace the current entry with its bare path.
    ClientSide,
    /// Full page load of the authenticated landing route.
    FullReload,
}

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("too many redirects navigating to {target}: {}", .hops.join(" -> "))]
    TooManyRedirects { target: String, hops: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub from: String,
    pub to: String,
    pub reason: RedirectReason,
}

/// Result of one committed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavOutcome {
    pub requested: Location,
    pub committed: Location,
    pub redirects: Vec<Redirect>,
}

impl NavOutcome {
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        !self.redirects.is_empty()
    }
}

pub struct Navigator<H: History> {
    history: Mutex<H>,
    guard: NavigationGuard,
    recovery: OAuthRecovery,
}

impl<H: History> Navigator<H> {
    #[must_use]
    pub fn new(history: H, guard: NavigationGuard, recovery: OAuthRecovery) -> Self {
        Self { history: Mutex::new(history), guard, recovery }
    }

    #[must_use]
    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    /// Location currently shown.
    pub async fn current(&self) -> Location {
        self.history.lock().await.current().clone()
    }

    /// Run `f` against the history while holding the navigation lock.
    pub async fn with_history<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&*self.history.lock().await)
    }

    /// Navigate to `target` (a path, optionally with query and fragment).
    ///
    /// # Errors
    ///
    /// Returns `TooManyRedirects` if the guard keeps redirecting.
    pub async fn navigate(&self, target: &str) -> Result<NavOutcome, NavigationError> {
        let mut history = self.history.lock().await;
        self.navigate_locked(&mut *history, Location::parse(target)).await
    }

    /// React to an auth-state change.
    ///
    /// Returns the navigation performed, if any.
    ///
    /// # Errors
    ///
    /// Returns `TooManyRedirects` if the follow-up navigation loops.
    pub async fn handle_auth_change(&self, change: &AuthChange) -> Result<Option<NavOutcome>, NavigationError> {
        let mut history = self.history.lock().await;
        match change.event {
            AuthEvent::SignedIn if change.session.is_some() => {
                self.guard.roles().clear();
                let landing = self.guard.routes().authenticated_landing().to_owned();
                let current = history.current().clone();

                if current.has_oauth_error_signature() {
                    warn!(location = %current, "oauth error signature in url after sign-in; clearing");
                    match self.recovery {
                        OAuthRecovery::ClientSide => history.replace(current.without_query_and_fragment()),
                        OAuthRecovery::FullReload => {
                            history.reload(Location::from_path(&landing));
                            self.guard.roles().clear();
                            info!(to = %landing, "reloaded after oauth error");
                            return Ok(None);
                        }
                    }
                }

                if history.current().path == landing {
                    debug!("signed in on authenticated landing; staying");
                    return Ok(None);
                }
                info!(to = %landing, "signed in; redirecting");
                self.navigate_locked(&mut *history, Location::from_path(&landing))
                    .await
                    .map(Some)
            }
            AuthEvent::SignedIn => {
                warn!("SIGNED_IN without session; ignored");
                Ok(None)
            }
            AuthEvent::SignedOut => {
                self.guard.roles().clear();
                let here = Location::from_path(&history.current().path);
                info!(path = %here.path, "signed out; re-checking current route");
                self.navigate_locked(&mut *history, here).await.map(Some)
            }
            other => {
                debug!(event = %other, has_session = change.session.is_some(), "auth event; no navigation");
                Ok(None)
            }
        }
    }

    async fn navigate_locked(&self, history: &mut H, target: Location) -> Result<NavOutcome, NavigationError> {
        let requested = target.clone();
        let mut destination = target;
        let mut redirects: Vec<Redirect> = Vec::new();

        while let GuardDecision::Redirect { to, reason } = self.guard.evaluate(&destination.path).await {
            if redirects.len() >= MAX_REDIRECTS {
                let mut hops: Vec<String> = redirects.iter().map(|r| r.from.clone()).collect();
                hops.push(destination.path.clone());
                hops.push(to);
                warn!(requested = %requested, "redirect loop; navigation abandoned");
                return Err(NavigationError::TooManyRedirects { target: requested.to_string(), hops });
            }
            debug!(from = %destination.path, %to, %reason, "guard redirect");
            redirects.push(Redirect { from: destination.path.clone(), to: to.clone(), reason });
            destination = Location::parse(&to);
        }

        if history.current().path == destination.path {
            history.replace(destination);
        } else {
            history.push(destination);
        }
        scrub(history);

        let committed = history.current().clone();
        info!(requested = %requested, committed = %committed, redirects = redirects.len(), "navigation committed");
        Ok(NavOutcome { requested, committed, redirects })
    }
}

/// Post-navigation hook: drop query and fragment from the visible entry.
fn scrub<H: History>(history: &mut H) {
    let current = history.current();
    if !current.is_clean() {
        debug!(location = %current, "scrubbing query and fragment");
        let bare = current.without_query_and_fragment();
        history.replace(bare);
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
