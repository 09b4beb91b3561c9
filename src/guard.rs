//! Navigation guard: decides whether a transition may commit.
//!
//! Stages run in order and each may short-circuit:
//! route lookup, guest-only, auth, admin. Remote failures never fail open:
//! a session error reads as "signed out" and a role error reads as
//! "not admin".

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::AuthBackend;
use crate::role_cache::RoleCache;
use crate::routes::{RouteDescriptor, RouteTable};

/// Role value granting access to admin routes.
pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    UnknownRoute,
    GuestOnly,
    Unauthenticated,
    NotAdmin,
}

impl RedirectReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownRoute => "unknown_route",
            Self::GuestOnly => "guest_only",
            Self::Unauthenticated => "unauthenticated",
            Self::NotAdmin => "not_admin",
        }
    }
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect { to: String, reason: RedirectReason },
}

pub struct NavigationGuard {
    backend: Arc<dyn AuthBackend>,
    routes: Arc<RouteTable>,
    roles: RoleCache,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>, routes: Arc<RouteTable>, roles: RoleCache) -> Self {
        Self { backend, routes, roles }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn roles(&self) -> &RoleCache {
        &self.roles
    }

    /// Evaluate a transition to `path`.
    pub async fn evaluate(&self, path: &str) -> GuardDecision {
        let Some(route) = self.routes.lookup(path) else {
            info!(%path, "no such route; sending to public landing");
            return redirect(self.routes.public_landing(), RedirectReason::UnknownRoute);
        };

        if !route.guest_only && !route.requires_auth {
            debug!(%path, "public route");
            return GuardDecision::Proceed;
        }

        let signed_in = self.has_session().await;

        if route.guest_only {
            if signed_in {
                info!(%path, "guest-only route with active session");
                return redirect(self.routes.authenticated_landing(), RedirectReason::GuestOnly);
            }
            debug!(%path, "guest-only route, no session");
            return GuardDecision::Proceed;
        }

        if !signed_in {
            info!(%path, "route requires auth; no session");
            return redirect(self.routes.public_landing(), RedirectReason::Unauthenticated);
        }

        if route.requires_admin && !self.is_admin(route).await {
            return redirect(self.routes.authenticated_landing(), RedirectReason::NotAdmin);
        }

        debug!(%path, "access granted");
        GuardDecision::Proceed
    }

    async fn has_session(&self) -> bool {
        match self.backend.get_session().await {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!(error = %e, "session lookup failed; treating as signed out");
                false
            }
        }
    }

    async fn is_admin(&self, route: &RouteDescriptor) -> bool {
        let user = match self.backend.get_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(path = %route.path, "session without identity; denying admin route");
                return false;
            }
            Err(e) => {
                warn!(path = %route.path, error = %e, "user lookup failed; denying admin route");
                return false;
            }
        };

        if let Some(role) = self.roles.get(user.id) {
            debug!(user_id = %user.id, %role, "role cache hit");
            return role == ADMIN_ROLE;
        }

        match self.backend.fetch_role(user.id).await {
            Ok(role) => {
                self.roles.insert(user.id, &role);
                let admin = role == ADMIN_ROLE;
                if !admin {
                    info!(path = %route.path, user_id = %user.id, %role, "admin route denied");
                }
                admin
            }
            Err(e) => {
                warn!(path = %route.path, user_id = %user.id, error = %e, "role lookup failed; denying admin route");
                false
            }
        }
    }
}

fn redirect(to: &str, reason: RedirectReason) -> GuardDecision {
    GuardDecision::Redirect { to: to.to_owned(), reason }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
